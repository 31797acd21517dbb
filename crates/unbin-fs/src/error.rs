use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("path not found: {0}")]
    NotFound(PathBuf),

    #[error("'{path}' is outside of scoped root '{root}'")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    #[error("scoped root '{root}' is locked by another run (lock file '{lock}')")]
    Locked { root: PathBuf, lock: PathBuf },

    #[error("failed to create staging directory: {source}")]
    Staging { source: io::Error },
}

impl Error {
    /// The path this error is about, when there is one.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Read { path, .. }
            | Self::Write { path, .. }
            | Self::NotFound(path)
            | Self::OutsideRoot { path, .. } => Some(path),
            Self::Locked { root, .. } => Some(root),
            Self::Staging { .. } => None,
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Read { source, .. } | Self::Write { source, .. } => {
                source.kind() == io::ErrorKind::PermissionDenied
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn read_err(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
    let path = path.into();
    move |source| {
        if source.kind() == io::ErrorKind::NotFound {
            Error::NotFound(path)
        } else {
            Error::Read { path, source }
        }
    }
}

pub(crate) fn write_err(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
    let path = path.into();
    move |source| Error::Write { path, source }
}
