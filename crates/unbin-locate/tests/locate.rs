use std::fs;
use std::path::Path;

use unbin_locate::{Catalog, DeliverableSpec, Locator, NameMatch};

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "x").unwrap();
}

fn compiler_spec() -> DeliverableSpec {
    DeliverableSpec::dir("compiler", NameMatch::exact("powerpc-eabivle-4_9"))
        .requires("bin/powerpc-eabivle-gcc")
}

#[test]
fn shallowest_match_wins() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    // depth 5 sorts first lexicographically, depth 2 must still win
    touch(&root.join("a/b/c/d/powerpc-eabivle-4_9/bin/powerpc-eabivle-gcc"));
    touch(&root.join("z/powerpc-eabivle-4_9/bin/powerpc-eabivle-gcc"));

    let report = Locator::new(root).locate(&[compiler_spec()]).unwrap();
    assert_eq!(
        report.path("compiler"),
        Some(root.join("z/powerpc-eabivle-4_9").as_path())
    );
}

#[test]
fn equal_depth_breaks_lexicographically() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(&root.join("b/powerpc-eabivle-4_9/bin/powerpc-eabivle-gcc"));
    touch(&root.join("a/powerpc-eabivle-4_9/bin/powerpc-eabivle-gcc"));

    let report = Locator::new(root).locate(&[compiler_spec()]).unwrap();
    assert_eq!(
        report.path("compiler"),
        Some(root.join("a/powerpc-eabivle-4_9").as_path())
    );
}

#[test]
fn name_match_without_required_entry_is_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("powerpc-eabivle-4_9/share")).unwrap();

    let report = Locator::new(root).locate(&[compiler_spec()]).unwrap();
    assert!(!report.all_required_found());
    assert_eq!(report.missing_required(), ["compiler"]);
}

#[test]
fn full_catalog_against_installer_layout() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let plugins = root.join("eclipse/plugins");
    touch(&plugins.join(
        "com.nxp.s32ds.tools.ppc_1.0/Cross_Tools/powerpc-eabivle-4_9/bin/powerpc-eabivle-gcc",
    ));
    touch(&plugins.join("com.pemicro.debug.gdbjtag.ppc_1.7.2/lin/pegdbserver_power_console"));
    touch(&plugins.join("com.pemicro.debug.gdbjtag.ppc_1.7.2/win32/pegdbserver_power_console.exe"));
    touch(&plugins.join("com.pemicro.debug.gdbjtag.ppc_1.7.2/win32/gdi/P&E/x.dll"));
    touch(&plugins.join("com.pemicro.debug.gdbjtag.ppc_1.7.2/lin/gdi/P&E/x.so"));
    touch(&plugins.join("com.nxp.s32ds.ewl_1.0/e200_ewl2/EWL_C/include/stdio.h"));
    touch(&root.join("drivers/libusb_64_32/58-pemicro.rules"));
    touch(&root.join("drivers/libusb_64_32/libp64-0.1.so.4"));

    let catalog = Catalog::s32ds_power().unwrap();
    let before: Vec<_> = walk(root);
    let report = Locator::new(root).locate(catalog.as_slice()).unwrap();

    assert!(report.all_required_found(), "missing: {:?}", report.missing_required());
    assert_eq!(
        report.path("gdbserver"),
        Some(plugins.join("com.pemicro.debug.gdbjtag.ppc_1.7.2/lin").as_path())
    );
    // only the linux GDI directory qualifies
    assert_eq!(
        report.path("gdi"),
        Some(plugins.join("com.pemicro.debug.gdbjtag.ppc_1.7.2/lin/gdi").as_path())
    );
    assert_eq!(
        report.path("drivers"),
        Some(root.join("drivers/libusb_64_32").as_path())
    );
    // read-only
    assert_eq!(walk(root), before);
}

#[test]
fn windows_gdi_is_never_picked() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(&root.join("plugins/com.pemicro.debug.gdbjtag.ppc_1.7.2/win32/gdi/P&E/x.dll"));

    let catalog = Catalog::s32ds_power().unwrap();
    let report = Locator::new(root).locate(catalog.as_slice()).unwrap();
    assert!(!report.get("gdi").unwrap().found());
}

#[test]
fn optional_miss_does_not_block() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    touch(&root.join("powerpc-eabivle-4_9/bin/powerpc-eabivle-gcc"));

    let specs = [
        compiler_spec(),
        DeliverableSpec::dir("gdi", NameMatch::exact("gdi")).optional(),
    ];
    let report = Locator::new(root).locate(&specs).unwrap();
    assert!(report.all_required_found());
    assert!(!report.get("gdi").unwrap().found());
}

fn walk(root: &Path) -> Vec<std::path::PathBuf> {
    let mut out: Vec<_> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .collect();
    out.sort();
    out
}
