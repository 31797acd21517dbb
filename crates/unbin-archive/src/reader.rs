use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, write_err};
use crate::fallback::{FallbackExtractor, UnzipTool, has_entries};
use crate::format::has_zip_signature;
use crate::place::Destination;
use crate::strict;

/// Name prefix of the directory a fallback extractor writes into.
pub const SCRATCH_PREFIX: &str = ".unbin-fallback-";

/// Which strategy produced an extraction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    Strict,
    /// The strict reader rejected the container and the fallback tool
    /// extracted it.
    Tolerant,
}

/// Result of one successful container extraction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Extraction {
    pub container: PathBuf,
    pub destination: PathBuf,
    pub strategy: Strategy,
    /// Entries written. For tolerant extractions this counts what the
    /// fallback tool produced.
    pub entries: usize,
    pub bytes: u64,
    pub warnings: Vec<String>,
}

impl Extraction {
    pub fn is_corrupted(&self) -> bool {
        self.strategy == Strategy::Tolerant
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Both strategies failed, or the container is unsafe to extract.
    UnrecoverableCorruption,
    /// No zip signature; fallback is not attempted.
    NotAContainer,
    PermissionDenied,
    /// Already attempted in this run; never retried.
    Revisited,
    /// The destination directory already existed and the collision policy
    /// refused to merge.
    Collision,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UnrecoverableCorruption => "unrecoverable corruption",
            Self::NotAContainer => "not a container",
            Self::PermissionDenied => "permission denied",
            Self::Revisited => "revisited",
            Self::Collision => "directory collision",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("container '{path}' failed ({class}): {source}")]
pub struct ContainerError {
    pub path: PathBuf,
    pub class: FailureClass,
    #[source]
    pub source: Error,
}

impl ContainerError {
    fn new(path: &Path, class: FailureClass, source: Error) -> Self {
        Self {
            path: path.to_path_buf(),
            class,
            source,
        }
    }
}

/// Single-container extraction: strict first, tolerant fallback on
/// recognized corruption.
pub struct ContainerReader {
    fallback: Option<Box<dyn FallbackExtractor>>,
}

impl Default for ContainerReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ContainerReader {
    /// Reader with [`UnzipTool`] as fallback.
    pub fn new() -> Self {
        Self {
            fallback: Some(Box::new(UnzipTool::default())),
        }
    }

    /// Reader that never falls back.
    pub fn strict_only() -> Self {
        Self { fallback: None }
    }

    pub fn with_fallback(mut self, fallback: impl FallbackExtractor + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    pub fn fallback_name(&self) -> Option<&str> {
        self.fallback.as_deref().map(|f| f.name())
    }

    /// Extract every entry of `container` into `dest`.
    #[tracing::instrument(skip_all, fields(container = %container.display()))]
    pub fn extract(&self, container: &Path, dest: &Path) -> Result<Extraction, ContainerError> {
        let fail = |class, source| ContainerError::new(container, class, source);

        match has_zip_signature(container) {
            Ok(true) => {}
            Ok(false) => {
                return Err(fail(
                    FailureClass::NotAContainer,
                    Error::NotAContainer {
                        path: container.to_path_buf(),
                    },
                ));
            }
            Err(e) => return Err(fail(classify(&e), e)),
        }

        let strict_err = match strict::extract(container, dest) {
            Ok(outcome) => {
                return Ok(Extraction {
                    container: container.to_path_buf(),
                    destination: dest.to_path_buf(),
                    strategy: Strategy::Strict,
                    entries: outcome.entries,
                    bytes: outcome.bytes,
                    warnings: outcome.warnings,
                });
            }
            Err(e) => e,
        };

        if !strict_err.is_corruption_signature() {
            return Err(fail(classify(&strict_err), strict_err));
        }
        let Some(fallback) = self.fallback.as_deref() else {
            return Err(fail(FailureClass::UnrecoverableCorruption, strict_err));
        };

        tracing::warn!(
            "strict extraction rejected container ({strict_err}), retrying with {}",
            fallback.name()
        );

        // fallback output is judged on its own directory, never on what
        // `dest` already held
        let parent = dest.parent().unwrap_or(dest);
        let scratch = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir_in(parent)
            .map_err(|e| {
                let err = write_err(parent)(e);
                fail(classify(&err), err)
            })?;

        let outcome = match fallback.extract(container, scratch.path()) {
            Ok(outcome) if has_entries(scratch.path()) => outcome,
            Ok(_) => return Err(fail(FailureClass::UnrecoverableCorruption, strict_err)),
            Err(e) => {
                tracing::debug!("fallback failed: {e}");
                return Err(fail(FailureClass::UnrecoverableCorruption, e));
            }
        };

        let placed = Destination::create(dest)
            .and_then(|d| d.merge_tree(scratch.path()))
            .map_err(|e| fail(classify(&e), e))?;

        let mut warnings = vec![format!("recovered with {}: {strict_err}", fallback.name())];
        warnings.extend(outcome.warnings);
        warnings.extend(placed.warnings);
        Ok(Extraction {
            container: container.to_path_buf(),
            destination: dest.to_path_buf(),
            strategy: Strategy::Tolerant,
            entries: placed.entries,
            bytes: placed.bytes,
            warnings,
        })
    }

    /// Extract, then remove `container`. A failed container stays on disk.
    pub fn consume(&self, container: &Path, dest: &Path) -> Result<Extraction, ContainerError> {
        let extraction = self.extract(container, dest)?;
        std::fs::remove_file(container).map_err(|e| {
            let err = write_err(container)(e);
            ContainerError::new(container, classify(&err), err)
        })?;
        Ok(extraction)
    }
}

fn classify(err: &Error) -> FailureClass {
    if err.is_permission_denied() {
        FailureClass::PermissionDenied
    } else {
        FailureClass::UnrecoverableCorruption
    }
}
