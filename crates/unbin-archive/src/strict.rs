use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use unbin_fs::PermissionMode;

use crate::error::{Error, Result, read_err};
use crate::place::Destination;
use crate::sanitize::sanitize_entry;

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;

#[derive(Clone, Debug, Default)]
pub(crate) struct StrictOutcome {
    pub entries: usize,
    pub bytes: u64,
    pub warnings: Vec<String>,
}

/// Extract with the `zip` crate, failing on the first structural problem.
pub(crate) fn extract(container: &Path, dest: &Path) -> Result<StrictOutcome> {
    let file = File::open(container).map_err(read_err(container))?;
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|source| Error::Zip {
            path: container.to_path_buf(),
            source,
        })?;

    let dest = Destination::create(dest)?;

    let mut outcome = StrictOutcome::default();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|source| Error::Zip {
            path: container.to_path_buf(),
            source,
        })?;
        let name = entry.name().to_string();
        if is_self_reference(&name) {
            continue;
        }

        let target = sanitize_entry(&name, dest.path())?;
        let mode = entry.unix_mode();

        if entry.is_dir() {
            dest.write_dir(&target, &name)?;
        } else if mode.is_some_and(|m| m & S_IFMT == S_IFLNK) {
            let mut link_text = String::new();
            entry
                .read_to_string(&mut link_text)
                .map_err(|source| Error::EntryRead {
                    path: container.to_path_buf(),
                    entry: name.clone(),
                    source,
                })?;
            if !dest.write_symlink(Path::new(&link_text), &target, &name)? {
                outcome
                    .warnings
                    .push(format!("skipped symlink '{name}' -> '{link_text}' escaping destination"));
            }
        } else {
            outcome.bytes += dest.write_file(&mut entry, &target, container, &name)?;
            PermissionMode::from_archive_mode(mode).apply_to_path(&target)?;
        }
        outcome.entries += 1;
    }

    tracing::debug!(
        container = %container.display(),
        entries = outcome.entries,
        bytes = outcome.bytes,
        "strict extraction finished"
    );
    Ok(outcome)
}

fn is_self_reference(name: &str) -> bool {
    matches!(name.trim_end_matches('/'), "" | ".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn build_zip(path: &Path, entries: &[(&str, &[u8], u32)]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, data, mode) in entries {
            let options = SimpleFileOptions::default().unix_permissions(*mode);
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn extracts_nested_entries() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("a.zip");
        build_zip(
            &container,
            &[
                ("top.txt", b"top".as_slice(), 0o644),
                ("deep/er/leaf.txt", b"leaf".as_slice(), 0o644),
            ],
        );

        let dest = dir.path().join("a");
        let outcome = extract(&container, &dest).unwrap();
        assert_eq!(outcome.entries, 2);
        assert_eq!(outcome.bytes, 7);
        assert_eq!(std::fs::read(dest.join("deep/er/leaf.txt")).unwrap(), b"leaf");
    }

    #[cfg(unix)]
    #[test]
    fn keeps_executable_bits() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("tools.zip");
        build_zip(
            &container,
            &[
                ("bin/powerpc-eabivle-gcc", b"\x7fELF".as_slice(), 0o755),
                ("README", b"r".as_slice(), 0o600),
            ],
        );
        let dest = dir.path().join("tools");
        extract(&container, &dest).unwrap();

        assert!(unbin_fs::is_executable(&dest.join("bin/powerpc-eabivle-gcc")).unwrap());
        assert!(!unbin_fs::is_executable(&dest.join("README")).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_inside_destination_only() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("links.zip");
        let mut writer = zip::ZipWriter::new(File::create(&container).unwrap());
        let options = SimpleFileOptions::default();
        writer.start_file("lib/libfoo.so.1", options).unwrap();
        writer.write_all(b"so").unwrap();
        writer.add_symlink("lib/libfoo.so", "libfoo.so.1", options).unwrap();
        writer.add_symlink("lib/evil", "../../../../etc/passwd", options).unwrap();
        writer.finish().unwrap();

        let dest = dir.path().join("links");
        let outcome = extract(&container, &dest).unwrap();

        let link = dest.join("lib/libfoo.so");
        assert!(link.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read(&link).unwrap(), b"so");
        assert!(dest.join("lib/evil").symlink_metadata().is_err());
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn garbage_after_signature_is_structural_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("broken.zip");
        let mut data = b"PK\x03\x04".to_vec();
        data.extend(std::iter::repeat_n(0xAB, 256));
        std::fs::write(&container, data).unwrap();

        let err = extract(&container, &dir.path().join("broken")).unwrap_err();
        assert!(err.is_corruption_signature(), "{err}");
    }

    #[test]
    fn zip_slip_entry_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            writer
                .start_file("../escape.txt", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"x").unwrap();
            writer.finish().unwrap();
        }
        let container = dir.path().join("slip.zip");
        std::fs::write(&container, buf.into_inner()).unwrap();

        let dest = dir.path().join("slip");
        assert!(matches!(extract(&container, &dest), Err(Error::ZipSlip { .. })));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn chained_links_cannot_carry_writes_outside() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("installer");
        std::fs::create_dir(&root).unwrap();
        let container = root.join("chain.zip");
        let mut writer = zip::ZipWriter::new(File::create(&container).unwrap());
        let options = SimpleFileOptions::default();
        writer.add_symlink("a", ".", options).unwrap();
        writer.add_symlink("a/b", "..", options).unwrap();
        writer.add_symlink("a/b/c", "..", options).unwrap();
        writer.start_file("a/b/c/escaped.txt", options).unwrap();
        writer.write_all(b"x").unwrap();
        writer.finish().unwrap();

        let dest = root.join("chain");
        let outcome = extract(&container, &dest).unwrap();

        // `a/b -> ..` resolves through `a -> .` to the parent and is dropped
        assert_eq!(outcome.warnings.len(), 1, "{:?}", outcome.warnings);
        assert!(!dir.path().join("escaped.txt").exists());
        assert!(!root.join("escaped.txt").exists());
        let mut top: Vec<_> = std::fs::read_dir(&root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        top.sort();
        assert_eq!(top, ["chain", "chain.zip"]);
        assert_eq!(std::fs::read(dest.join("escaped.txt")).unwrap(), b"x");
    }

    #[cfg(unix)]
    #[test]
    fn merge_into_directory_with_outside_link_fails() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().join("outside");
        std::fs::create_dir(&outside).unwrap();
        let dest = dir.path().join("root/lib");
        std::fs::create_dir_all(&dest).unwrap();
        std::os::unix::fs::symlink(&outside, dest.join("out")).unwrap();

        let container = dir.path().join("root/lib.zip");
        build_zip(&container, &[("out/pwned.txt", b"x".as_slice(), 0o644)]);

        let err = extract(&container, &dest).unwrap_err();
        assert!(matches!(err, Error::SymlinkEscape { .. }), "{err}");
        assert!(!err.is_corruption_signature());
        assert!(!outside.join("pwned.txt").exists());
    }
}
