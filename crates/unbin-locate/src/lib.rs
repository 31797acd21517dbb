//! Deliverable Locator.
//!
//! Deliverables are declared as data ([`DeliverableSpec`]) and compiled into
//! predicates over a single walk of the tree, so adding one never touches the
//! walking code. Matching is by names and paths only.

pub use error::{Error, Result};
pub use locator::{DeliverableResult, LocateReport, Locator};
pub use matcher::NameMatch;
pub use query::{Entry, Query};
pub use spec::{Catalog, DeliverableSpec, EntryKind};

mod error;
mod locator;
mod matcher;
mod query;
mod spec;
