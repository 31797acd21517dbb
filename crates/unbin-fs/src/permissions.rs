use std::path::Path;

use crate::error::{Result, read_err, write_err};

/// File permission modes applied to extracted and staged files.
///
/// Off unix only the readonly attribute is touched: it is set when the mode
/// grants no write bit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PermissionMode {
    /// Leave whatever the process umask produced.
    #[default]
    Inherit,

    /// `0o755` (rwxr-xr-x). Used for lifecycle scripts.
    Executable,

    /// `0o644` (rw-r--r--). Used for control metadata.
    ReadWrite,

    /// Raw unix mode bits, as recorded in an archive entry.
    Custom(u32),
}

impl PermissionMode {
    /// Mode from archive bits: executable entries keep their bits, everything
    /// else is at least owner-writable and world-readable.
    pub fn from_archive_mode(mode: Option<u32>) -> Self {
        match mode {
            Some(m) if m & 0o111 != 0 => Self::Custom(m & 0o7777),
            Some(m) => Self::Custom((m & 0o7777) | 0o644),
            None => Self::ReadWrite,
        }
    }

    pub fn to_unix_mode(self) -> Option<u32> {
        match self {
            Self::Inherit => None,
            Self::Executable => Some(0o755),
            Self::ReadWrite => Some(0o644),
            Self::Custom(mode) => Some(mode),
        }
    }

    pub fn is_executable(self) -> bool {
        self.to_unix_mode().is_some_and(|m| m & 0o111 != 0)
    }

    pub fn apply_to_path(self, path: &Path) -> Result<()> {
        let Some(mode) = self.to_unix_mode() else {
            return Ok(());
        };

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
                .map_err(write_err(path))?;
        }

        #[cfg(not(unix))]
        {
            let mut perms = std::fs::metadata(path)
                .map_err(read_err(path))?
                .permissions();
            perms.set_readonly(mode & 0o222 == 0);
            std::fs::set_permissions(path, perms).map_err(write_err(path))?;
        }

        Ok(())
    }
}

impl From<u32> for PermissionMode {
    fn from(mode: u32) -> Self {
        Self::Custom(mode)
    }
}

/// Unix mode bits of an existing path (`None` off unix).
pub fn mode_of(path: &Path) -> Result<Option<u32>> {
    let metadata = std::fs::symlink_metadata(path).map_err(read_err(path))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        Ok(Some(metadata.permissions().mode() & 0o7777))
    }

    #[cfg(not(unix))]
    {
        let _ = metadata;
        Ok(None)
    }
}

/// Whether any execute bit is set on `path`.
pub fn is_executable(path: &Path) -> Result<bool> {
    Ok(mode_of(path)?.is_some_and(|m| m & 0o111 != 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn archive_mode_keeps_exec_bits() {
        assert_eq!(
            PermissionMode::from_archive_mode(Some(0o100755)),
            PermissionMode::Custom(0o755)
        );
        assert_eq!(
            PermissionMode::from_archive_mode(Some(0o600)),
            PermissionMode::Custom(0o644)
        );
        assert_eq!(PermissionMode::from_archive_mode(None), PermissionMode::ReadWrite);
    }

    #[test]
    fn mode_executable_detection() {
        assert!(PermissionMode::Executable.is_executable());
        assert!(!PermissionMode::ReadWrite.is_executable());
        assert!(!PermissionMode::Inherit.is_executable());
        assert!(PermissionMode::Custom(0o700).is_executable());
    }

    #[cfg(unix)]
    #[test]
    fn apply_executable() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("postinst");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();

        assert!(!is_executable(&path)?);
        PermissionMode::Executable.apply_to_path(&path)?;
        assert!(is_executable(&path)?);
        assert_eq!(mode_of(&path)?, Some(0o755));
        Ok(())
    }

    #[test]
    fn inherit_is_noop_on_missing_path() {
        let dir = tempdir().unwrap();
        assert!(
            PermissionMode::Inherit
                .apply_to_path(&dir.path().join("missing"))
                .is_ok()
        );
    }
}
