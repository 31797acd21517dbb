use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Resolve an entry name against `base`, refusing anything that lands outside.
pub fn sanitize_entry(entry: &str, base: &Path) -> Result<PathBuf> {
    if entry.contains('\0') {
        return Err(Error::InvalidPath {
            entry: entry.to_string(),
        });
    }

    // zip names always use '/', but some producers write '\'
    let entry_path = PathBuf::from(entry.replace('\\', "/"));
    let normalized = normalize(&entry_path);

    // Reject absolute paths (zip-slip protection)
    if normalized.has_root() || entry_path.is_absolute() {
        return Err(Error::ZipSlip {
            entry: entry_path,
            resolved: normalized,
        });
    }

    let resolved = normalize(&base.join(&entry_path));
    if !resolved.starts_with(base) || resolved == base {
        return Err(Error::ZipSlip {
            entry: entry_path,
            resolved,
        });
    }
    Ok(resolved)
}

/// Resolve a symlink target against the directory holding the link; `None`
/// when it escapes `base` or is absolute. Pass the real (canonical) directory
/// so earlier links along the way are accounted for.
pub fn sanitize_symlink_target(target: &Path, link_dir: &Path, base: &Path) -> Option<PathBuf> {
    if target.has_root() {
        return None;
    }
    let resolved = normalize(&link_dir.join(target));
    resolved.starts_with(base).then_some(resolved)
}

fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::ParentDir => {
                result.pop();
            }
            Component::Normal(part) => result.push(part),
            Component::RootDir => result.push("/"),
            Component::Prefix(prefix) => result.push(prefix.as_os_str()),
            Component::CurDir => {}
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> &'static Path {
        Path::new("/work/installer/plugins")
    }

    #[test]
    fn plain_entries_resolve_under_base() {
        let resolved = sanitize_entry("eclipse/plugins/a.jar", base()).unwrap();
        assert_eq!(resolved, base().join("eclipse/plugins/a.jar"));

        let resolved = sanitize_entry("a/./b/../c", base()).unwrap();
        assert_eq!(resolved, base().join("a/c"));
    }

    #[test]
    fn escapes_are_rejected() {
        for entry in ["../../etc/passwd", "/etc/passwd", "a/../../x", "..", ".", "\\abs"] {
            assert!(
                matches!(sanitize_entry(entry, base()), Err(Error::ZipSlip { .. })),
                "{entry} should be rejected"
            );
        }
        assert!(matches!(
            sanitize_entry("a\0b", base()),
            Err(Error::InvalidPath { .. })
        ));
    }

    #[test]
    fn symlink_targets() {
        let bin = base().join("bin");
        assert_eq!(
            sanitize_symlink_target(Path::new("../libexec/gcc"), &bin, base()),
            Some(base().join("libexec/gcc"))
        );
        assert_eq!(sanitize_symlink_target(Path::new("../../../x"), &bin, base()), None);
        assert_eq!(sanitize_symlink_target(Path::new("/usr/bin/gcc"), &bin, base()), None);
        assert_eq!(sanitize_symlink_target(Path::new(".."), base(), base()), None);
    }
}
