//! Filesystem primitives shared by the unpacking and packaging stages.
//!
//! - `scope.rs` - Scoped root and its exclusivity lock
//! - `staging.rs` - Self-removing staging directories
//! - `copy.rs` - Copies that keep mode bits and symlinks
//! - `permissions.rs` - Unix mode handling

mod copy;
mod error;
mod permissions;
mod scope;
mod staging;

pub use copy::{CopyStats, copy_dir_all, copy_file, copy_files_flat};
pub use error::{Error, Result};
pub use permissions::{PermissionMode, is_executable, mode_of};
pub use scope::{LOCK_FILE_NAME, RootLock, ScopedRoot, normalize};
pub use staging::Staging;
