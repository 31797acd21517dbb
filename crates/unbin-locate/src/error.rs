use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid name pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("deliverable '{0}' is declared more than once")]
    DuplicateName(String),

    #[error("deliverable '{name}' has an invalid required entry '{entry}'")]
    InvalidRequirement { name: String, entry: String },

    #[error("deliverable name must not be empty")]
    EmptyName,

    #[error("failed to parse deliverable catalog: {0}")]
    Catalog(#[from] toml::de::Error),

    #[error("search root '{0}' is not a directory")]
    RootMissing(PathBuf),

    #[error("failed to walk '{path}': {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
