use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::{Error, Result, write_err};

/// A fresh, isolated directory removed on drop unless persisted.
pub struct Staging {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Staging {
    /// New staging directory under the system temp dir.
    pub fn new(prefix: &str) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .map_err(|source| Error::Staging { source })?;
        Ok(Self::from_tempdir(dir))
    }

    /// New staging directory under `parent` (created if needed).
    pub fn new_in(parent: impl AsRef<Path>, prefix: &str) -> Result<Self> {
        let parent = parent.as_ref();
        std::fs::create_dir_all(parent).map_err(write_err(parent))?;
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir_in(parent)
            .map_err(|source| Error::Staging { source })?;
        Ok(Self::from_tempdir(dir))
    }

    fn from_tempdir(dir: TempDir) -> Self {
        let path = dir.path().to_path_buf();
        Self {
            dir: Some(dir),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, rel: impl AsRef<Path>) -> PathBuf {
        self.path.join(rel)
    }

    pub fn create_dir_all(&self, rel: impl AsRef<Path>) -> Result<PathBuf> {
        let full = self.join(rel);
        std::fs::create_dir_all(&full).map_err(write_err(&full))?;
        Ok(full)
    }

    pub fn write(&self, rel: impl AsRef<Path>, content: &[u8]) -> Result<PathBuf> {
        let full = self.join(rel);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).map_err(write_err(parent))?;
        }
        std::fs::write(&full, content).map_err(write_err(&full))?;
        Ok(full)
    }

    /// Keep the directory on disk after drop and return its path.
    pub fn persist(mut self) -> PathBuf {
        if let Some(dir) = self.dir.take() {
            let _ = dir.keep();
        }
        self.path.clone()
    }
}

impl std::fmt::Debug for Staging {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Staging")
            .field("path", &self.path)
            .field("persistent", &self.dir.is_none())
            .finish()
    }
}
