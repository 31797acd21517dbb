use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to scan '{path}': {source}")]
    Scan {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("unknown collision policy '{0}' (expected merge, rename or fail)")]
    UnknownPolicy(String),

    #[error(transparent)]
    Fs(#[from] unbin_fs::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
