//! Writing extracted entries under a destination directory.
//!
//! Entry names are sanitized lexically, but links written by earlier entries
//! (or earlier containers merged into the same directory) can still redirect
//! a lexically safe path. Every write therefore checks the real location of
//! its deepest existing ancestor against the real destination.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use unbin_fs::{PermissionMode, mode_of};
use walkdir::WalkDir;

use crate::error::{Error, Result, read_err, write_err};
use crate::sanitize::sanitize_symlink_target;

const COPY_BUFFER: usize = 64 * 1024;

/// Totals for a tree moved into a destination.
#[derive(Clone, Debug, Default)]
pub(crate) struct Placed {
    pub entries: usize,
    pub bytes: u64,
    pub warnings: Vec<String>,
}

pub(crate) struct Destination {
    path: PathBuf,
    real: PathBuf,
}

impl Destination {
    /// Create `path` if needed and resolve it.
    pub(crate) fn create(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(write_err(path))?;
        let real = path.canonicalize().map_err(read_err(path))?;
        Ok(Self {
            path: path.to_path_buf(),
            real,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Fails when the deepest existing ancestor of `path` really lives
    /// outside the destination.
    fn check(&self, path: &Path, entry: &str) -> Result<()> {
        let Some(existing) = path.ancestors().find(|p| p.symlink_metadata().is_ok()) else {
            return Ok(());
        };
        let escape = |resolved: PathBuf| Error::SymlinkEscape {
            entry: entry.to_string(),
            resolved,
        };
        let resolved = match existing.canonicalize() {
            Ok(resolved) => resolved,
            // dangling link
            Err(_) if existing.is_symlink() => return Err(escape(existing.to_path_buf())),
            Err(e) => return Err(read_err(existing)(e)),
        };
        if resolved.starts_with(&self.real) {
            Ok(())
        } else {
            Err(escape(resolved))
        }
    }

    pub(crate) fn write_dir(&self, target: &Path, entry: &str) -> Result<()> {
        self.check(target, entry)?;
        std::fs::create_dir_all(target).map_err(write_err(target))
    }

    /// Stream `reader` into `target`; `source` names what is being read.
    pub(crate) fn write_file<R: Read>(
        &self,
        reader: &mut R,
        target: &Path,
        source: &Path,
        entry: &str,
    ) -> Result<u64> {
        let parent = target.parent().unwrap_or(&self.path);
        self.check(parent, entry)?;
        std::fs::create_dir_all(parent).map_err(write_err(parent))?;
        remove_if_symlink(target)?;

        let mut out = File::create(target).map_err(write_err(target))?;
        let mut buf = vec![0u8; COPY_BUFFER];
        let mut written = 0u64;
        loop {
            let n = reader.read(&mut buf).map_err(|e| Error::EntryRead {
                path: source.to_path_buf(),
                entry: entry.to_string(),
                source: e,
            })?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n]).map_err(write_err(target))?;
            written += n as u64;
        }
        Ok(written)
    }

    /// Returns `false` when the link would point outside and was skipped.
    pub(crate) fn write_symlink(&self, link_target: &Path, link: &Path, entry: &str) -> Result<bool> {
        let parent = link.parent().unwrap_or(&self.path);
        self.check(parent, entry)?;
        std::fs::create_dir_all(parent).map_err(write_err(parent))?;

        let real_parent = parent.canonicalize().map_err(read_err(parent))?;
        if sanitize_symlink_target(link_target, &real_parent, &self.real).is_none() {
            return Ok(false);
        }
        remove_if_symlink(link)?;
        if link.is_file() {
            std::fs::remove_file(link).map_err(write_err(link))?;
        }
        create_symlink(link_target, link)?;
        Ok(true)
    }

    /// Move everything under `src` into the destination through the same
    /// checks as a native extraction.
    pub(crate) fn merge_tree(&self, src: &Path) -> Result<Placed> {
        let mut placed = Placed::default();
        let walker = WalkDir::new(src)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name();

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(src).to_path_buf();
                Error::Read {
                    path,
                    source: e.into(),
                }
            })?;
            let Ok(rel) = entry.path().strip_prefix(src) else {
                continue;
            };
            let name = rel.to_string_lossy().into_owned();
            let target = self.path.join(rel);
            let file_type = entry.file_type();

            if file_type.is_dir() {
                self.write_dir(&target, &name)?;
            } else if file_type.is_symlink() {
                let link_target =
                    std::fs::read_link(entry.path()).map_err(read_err(entry.path()))?;
                if self.write_symlink(&link_target, &target, &name)? {
                    placed.entries += 1;
                } else {
                    placed.warnings.push(format!(
                        "skipped symlink '{name}' -> '{}' escaping destination",
                        link_target.display()
                    ));
                }
            } else {
                let mut file = File::open(entry.path()).map_err(read_err(entry.path()))?;
                placed.bytes += self.write_file(&mut file, &target, entry.path(), &name)?;
                PermissionMode::from_archive_mode(mode_of(entry.path())?).apply_to_path(&target)?;
                placed.entries += 1;
            }
        }
        Ok(placed)
    }
}

fn remove_if_symlink(path: &Path) -> Result<()> {
    if path.is_symlink() {
        std::fs::remove_file(path).map_err(write_err(path))?;
    }
    Ok(())
}

#[cfg(unix)]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, link).map_err(write_err(link))
}

#[cfg(not(unix))]
fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    // No unprivileged symlinks here: keep the target text as a plain file.
    std::fs::write(link, target.to_string_lossy().as_bytes()).map_err(write_err(link))
}
