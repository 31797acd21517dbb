//! Recursive Unpacking Engine.
//!
//! Drives the Container Reader over a scoped root until no live containers
//! remain, or until a caller-supplied stop predicate is satisfied.

pub use engine::{Engine, StopPredicate, UnpackOptions};
pub use error::{Error, Result};
pub use policy::{CollisionPolicy, Resolution};
pub use report::{Collision, UnpackReport};
pub use state::{ArchiveNode, ExtractionState, FailedNode};

mod engine;
mod error;
mod policy;
mod report;
mod state;
