use std::fs;
use std::path::Path;

use crate::error::{Error, Result, read_err, write_err};

/// Totals for a completed copy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: usize,
    pub dirs: usize,
    pub symlinks: usize,
    pub bytes: u64,
}

impl CopyStats {
    fn absorb(&mut self, other: CopyStats) {
        self.files += other.files;
        self.dirs += other.dirs;
        self.symlinks += other.symlinks;
        self.bytes += other.bytes;
    }
}

/// Copy a single regular file, keeping its mode bits.
///
/// `std::fs::copy` already carries permissions over on unix; the parent of
/// `dest` is created when missing.
pub fn copy_file(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<u64> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if !src.is_file() {
        return Err(Error::NotFound(src.to_path_buf()));
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(write_err(parent))?;
    }

    fs::copy(src, dest).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            Error::NotFound(src.to_path_buf())
        } else {
            Error::Write {
                path: dest.to_path_buf(),
                source,
            }
        }
    })
}

/// Recursively copy `src` into `dest` (created if needed).
///
/// Regular files keep their mode bits, directories are recreated, and
/// symlinks are recreated pointing at the same target text.
pub fn copy_dir_all(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<CopyStats> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if !src.is_dir() {
        return Err(Error::NotFound(src.to_path_buf()));
    }

    let mut stats = CopyStats::default();
    if !dest.exists() {
        fs::create_dir_all(dest).map_err(write_err(dest))?;
    }
    stats.dirs += 1;

    for entry in fs::read_dir(src).map_err(read_err(src))? {
        let entry = entry.map_err(read_err(src))?;
        let file_type = entry.file_type().map_err(read_err(entry.path()))?;

        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());

        if file_type.is_dir() {
            stats.absorb(copy_dir_all(&src_path, &dest_path)?);
        } else if file_type.is_symlink() {
            let target = fs::read_link(&src_path).map_err(read_err(&src_path))?;
            copy_symlink(&target, &dest_path)?;
            stats.symlinks += 1;
        } else {
            stats.bytes += copy_file(&src_path, &dest_path)?;
            stats.files += 1;
        }
    }

    #[cfg(unix)]
    {
        if let Some(mode) = crate::permissions::mode_of(src)? {
            crate::PermissionMode::Custom(mode | 0o700).apply_to_path(dest)?;
        }
    }

    Ok(stats)
}

/// Copy only the regular files directly inside `src` into `dest`.
pub fn copy_files_flat(src: impl AsRef<Path>, dest: impl AsRef<Path>) -> Result<CopyStats> {
    let src = src.as_ref();
    let dest = dest.as_ref();

    if !src.is_dir() {
        return Err(Error::NotFound(src.to_path_buf()));
    }

    fs::create_dir_all(dest).map_err(write_err(dest))?;

    let mut stats = CopyStats {
        dirs: 1,
        ..Default::default()
    };
    let mut entries = fs::read_dir(src)
        .map_err(read_err(src))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(read_err(src))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_file() {
            stats.bytes += copy_file(&path, dest.join(entry.file_name()))?;
            stats.files += 1;
        }
    }
    Ok(stats)
}

#[cfg(unix)]
fn copy_symlink(target: &Path, link: &Path) -> Result<()> {
    if link.symlink_metadata().is_ok() {
        fs::remove_file(link).map_err(write_err(link))?;
    }
    std::os::unix::fs::symlink(target, link).map_err(write_err(link))
}

#[cfg(not(unix))]
fn copy_symlink(target: &Path, link: &Path) -> Result<()> {
    let resolved = link.parent().map(|p| p.join(target)).unwrap_or(target.to_path_buf());
    if resolved.is_dir() {
        copy_dir_all(&resolved, link).map(|_| ())
    } else {
        copy_file(&resolved, link).map(|_| ())
    }
}
