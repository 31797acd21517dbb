//! The scoped root: the single directory subtree an unpacking run may touch.
//!
//! Exclusivity is a precondition of every run, not a convention: callers hold
//! a [`RootLock`] for as long as they mutate the tree.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result, read_err, write_err};

/// Name of the lock file created inside a locked root.
pub const LOCK_FILE_NAME: &str = ".unbin.lock";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopedRoot {
    root: PathBuf,
}

impl ScopedRoot {
    /// Create (if needed) and canonicalize `root`.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.exists() {
            std::fs::create_dir_all(root).map_err(write_err(root))?;
        }
        let root = root.canonicalize().map_err(read_err(root))?;
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Lexical containment check; `path` may not exist yet.
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        normalize(&absolute).starts_with(&self.root)
    }

    /// Absolute, normalized form of `path`, or `OutsideRoot`.
    pub fn ensure_within(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let normalized = normalize(&absolute);
        if normalized.starts_with(&self.root) {
            Ok(normalized)
        } else {
            Err(Error::OutsideRoot {
                path: path.to_path_buf(),
                root: self.root.clone(),
            })
        }
    }

    /// `path` relative to the root (the root itself becomes an empty path).
    pub fn relative<'a>(&self, path: &'a Path) -> Option<&'a Path> {
        path.strip_prefix(&self.root).ok()
    }

    pub fn lock(&self) -> Result<RootLock> {
        RootLock::acquire(self)
    }
}

/// Exclusive claim on a [`ScopedRoot`], released on drop.
#[derive(Debug)]
pub struct RootLock {
    path: PathBuf,
}

impl RootLock {
    /// Claim `root`. A lock left behind by a process that no longer exists
    /// is replaced.
    pub fn acquire(root: &ScopedRoot) -> Result<Self> {
        match Self::create(root) {
            Err(Error::Locked { lock, .. }) if is_stale(&lock) => {
                tracing::warn!(lock = %lock.display(), "removing stale lock of a terminated run");
                std::fs::remove_file(&lock).map_err(write_err(&lock))?;
                Self::create(root)
            }
            other => other,
        }
    }

    fn create(root: &ScopedRoot) -> Result<Self> {
        let path = root.path().join(LOCK_FILE_NAME);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|source| {
                if source.kind() == std::io::ErrorKind::AlreadyExists {
                    Error::Locked {
                        root: root.path().to_path_buf(),
                        lock: path.clone(),
                    }
                } else {
                    Error::Write {
                        path: path.clone(),
                        source,
                    }
                }
            })?;
        writeln!(file, "{}", std::process::id()).map_err(write_err(&path))?;
        tracing::debug!(lock = %path.display(), "acquired scoped root");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RootLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(lock = %self.path.display(), "failed to release lock: {e}");
        }
    }
}

fn is_stale(lock: &Path) -> bool {
    let Ok(text) = std::fs::read_to_string(lock) else {
        return false;
    };
    match text.trim().parse::<u32>() {
        Ok(pid) => pid != std::process::id() && process_gone(pid),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
fn process_gone(pid: u32) -> bool {
    let proc = Path::new("/proc");
    proc.is_dir() && !proc.join(pid.to_string()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_gone(_pid: u32) -> bool {
    false
}

/// Resolve `.` and `..` lexically.
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::CurDir => {}
            other => result.push(other.as_os_str()),
        }
    }
    result
}
