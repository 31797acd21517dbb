//! Container Reader: installer payload carving and zip-family extraction.
//!
//! # Architecture
//!
//! - `payload.rs` - Locate and carve the zip payload of a self-extracting installer
//! - `format.rs` - Container recognition
//! - `sanitize.rs` - Path sanitization (zip-slip prevention)
//! - `place.rs` - Link-aware writes under a destination directory
//! - `strict.rs` - Native extraction with the `zip` crate
//! - `fallback.rs` - Tolerant external extractor
//! - `reader.rs` - Strategy selection and failure classification

pub use error::{Error, Result};
pub use fallback::{FallbackExtractor, FallbackOutcome, UnzipTool};
pub use format::{ContainerKind, ZIP_SIGNATURE, has_zip_signature, unpack_target};
pub use payload::{PayloadInfo, RawInstaller, sha256_file};
pub use reader::{
    ContainerError, ContainerReader, Extraction, FailureClass, SCRATCH_PREFIX, Strategy,
};
pub use sanitize::{sanitize_entry, sanitize_symlink_target};

mod error;
mod fallback;
mod format;
mod payload;
mod place;
mod reader;
mod sanitize;
mod strict;
