//! Package Layout Assembler.
//!
//! Copies located deliverables into an isolated staging tree shaped like a
//! Debian package, renders `DEBIAN/control` and lifecycle hooks from
//! templates, and hands the tree to a [`PackageCompiler`].

pub use assembler::{Assembler, StagedDeliverable, StagedTree};
pub use compiler::{DpkgDeb, PackageCompiler};
pub use error::{Error, Result};
pub use spec::{CopyMode, HookBinding, HookStage, Mapping, PackageSpec};
pub use templates::{CONTROL_TEMPLATE, Templates};

mod assembler;
mod compiler;
mod error;
mod spec;
mod templates;
