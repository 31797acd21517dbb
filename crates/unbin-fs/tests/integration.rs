use std::fs;

use tempfile::tempdir;
use unbin_fs::{Error, LOCK_FILE_NAME, PermissionMode, ScopedRoot, Staging, copy_dir_all};

#[test]
fn staged_copy_of_scoped_subtree() {
    let dir = tempdir().unwrap();
    let root = ScopedRoot::new(dir.path().join("installer")).unwrap();
    let _lock = root.lock().unwrap();

    let compiler = root.path().join("plugins/powerpc-eabivle-4_9");
    fs::create_dir_all(compiler.join("bin")).unwrap();
    fs::write(compiler.join("bin/powerpc-eabivle-gcc"), "#!/bin/sh\n").unwrap();
    PermissionMode::Executable
        .apply_to_path(&compiler.join("bin/powerpc-eabivle-gcc"))
        .unwrap();

    let staging = Staging::new("unbin-it-").unwrap();
    let dest = staging.join("usr/local/pkg/powerpc-eabivle-4_9");
    let stats = copy_dir_all(&compiler, &dest).unwrap();

    assert_eq!(stats.files, 1);
    assert!(dest.join("bin/powerpc-eabivle-gcc").is_file());
    #[cfg(unix)]
    assert!(unbin_fs::is_executable(&dest.join("bin/powerpc-eabivle-gcc")).unwrap());

    // the lock file never leaks into copies of sibling directories
    assert!(root.path().join(LOCK_FILE_NAME).exists());
    assert!(!dest.join(LOCK_FILE_NAME).exists());
}

#[test]
fn second_run_on_same_root_is_refused() {
    let dir = tempdir().unwrap();
    let first = ScopedRoot::new(dir.path()).unwrap();
    let second = ScopedRoot::new(dir.path()).unwrap();

    let _held = first.lock().unwrap();
    match second.lock() {
        Err(Error::Locked { root, .. }) => assert_eq!(root, first.path()),
        other => panic!("expected Locked, got {other:?}"),
    }
}

#[test]
fn escaping_paths_are_rejected() {
    let dir = tempdir().unwrap();
    let root = ScopedRoot::new(dir.path().join("scoped")).unwrap();

    assert!(root.ensure_within("nested/a.zip").is_ok());
    assert!(matches!(
        root.ensure_within(dir.path().join("elsewhere")),
        Err(Error::OutsideRoot { .. })
    ));
}
