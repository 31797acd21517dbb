use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("'{path}' is not an installer: no zip signature found")]
    NotAnInstaller { path: PathBuf },

    #[error("'{path}' does not start with a zip signature")]
    NotAContainer { path: PathBuf },

    #[error("failed to read zip structure of '{path}': {source}")]
    Zip {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("failed to read entry '{entry}' of '{path}': {source}")]
    EntryRead {
        path: PathBuf,
        entry: String,
        source: io::Error,
    },

    #[error("zip-slip attack detected: entry '{entry}' resolves to '{resolved}'")]
    ZipSlip { entry: PathBuf, resolved: PathBuf },

    #[error("entry '{entry}' would be written through a link resolving to '{resolved}', outside the destination")]
    SymlinkEscape { entry: String, resolved: PathBuf },

    #[error("entry name contains a null byte: '{entry}'")]
    InvalidPath { entry: String },

    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to run '{tool}': {source}")]
    ToolSpawn { tool: String, source: io::Error },

    #[error("'{tool}' could not extract '{path}' (exit {code:?}): {stderr}")]
    ToolFailed {
        tool: String,
        path: PathBuf,
        code: Option<i32>,
        stderr: String,
    },

    #[error(transparent)]
    Fs(#[from] unbin_fs::Error),
}

impl Error {
    pub fn is_permission_denied(&self) -> bool {
        match self {
            Self::Read { source, .. }
            | Self::Write { source, .. }
            | Self::EntryRead { source, .. } => source.kind() == io::ErrorKind::PermissionDenied,
            Self::Zip {
                source: zip::result::ZipError::Io(source),
                ..
            } => source.kind() == io::ErrorKind::PermissionDenied,
            Self::Fs(e) => e.is_permission_denied(),
            _ => false,
        }
    }

    /// Structural damage a tolerant extractor may still get past.
    pub fn is_corruption_signature(&self) -> bool {
        use zip::result::ZipError;
        match self {
            Self::Zip { source, .. } => match source {
                ZipError::InvalidArchive(_) | ZipError::UnsupportedArchive(_) => true,
                ZipError::Io(e) => matches!(
                    e.kind(),
                    io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData
                ),
                _ => false,
            },
            Self::EntryRead { source, .. } => source.kind() != io::ErrorKind::PermissionDenied,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn read_err(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
    let path = path.into();
    move |source| Error::Read { path, source }
}

pub(crate) fn write_err(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Error {
    let path = path.into();
    move |source| Error::Write { path, source }
}
