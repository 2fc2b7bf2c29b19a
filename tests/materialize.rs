// tests/materialize.rs

//! Manual diff-apply semantics: whiteout replay, delete-then-copy ordering,
//! and the persistence of the merged directory across layers.

mod common;

use common::{build_layer_tar, layer_from_tar};
use strata::rootfs::{WorkArea, apply_layer};
use strata::{Error, Image, Layer};

#[test]
fn whiteout_removes_prior_layer_file_and_marker_never_survives() {
    let fixtures = tempfile::tempdir().unwrap();
    let layer0_tar = build_layer_tar(
        fixtures.path(),
        "layer0.tar.gz",
        &[("etc/", ""), ("etc/foo.conf", "keep me around")],
    );
    let layer1_tar = build_layer_tar(
        fixtures.path(),
        "layer1.tar.gz",
        &[("etc/", ""), ("etc/.wh.foo.conf", "")],
    );
    let image = Image::new(vec![
        layer_from_tar(0, &layer0_tar),
        layer_from_tar(1, &layer1_tar),
    ]);

    let work = WorkArea::new().unwrap();
    let merged = work.merged_root().unwrap();
    apply_layer(&merged, &work, &image, 0).unwrap();
    assert!(merged.path().join("etc/foo.conf").exists());

    apply_layer(&merged, &work, &image, 1).unwrap();
    assert!(!merged.path().join("etc/foo.conf").exists());
    // The marker itself must appear in neither the merged nor staging tree
    assert!(!merged.path().join("etc/.wh.foo.conf").exists());
    assert!(!work.untar_dir(1).join("etc/.wh.foo.conf").exists());
}

#[test]
fn path_deleted_and_recreated_in_same_layer_ends_up_present() {
    let fixtures = tempfile::tempdir().unwrap();
    let layer0_tar = build_layer_tar(
        fixtures.path(),
        "layer0.tar.gz",
        &[("etc/", ""), ("etc/app.conf", "old contents")],
    );
    // Whiteout and recreation of the same path within one layer: deletions
    // run first, so the recreation must win
    let layer1_tar = build_layer_tar(
        fixtures.path(),
        "layer1.tar.gz",
        &[("etc/", ""), ("etc/.wh.app.conf", ""), ("etc/app.conf", "new contents")],
    );
    let image = Image::new(vec![
        layer_from_tar(0, &layer0_tar),
        layer_from_tar(1, &layer1_tar),
    ]);

    let work = WorkArea::new().unwrap();
    let merged = work.merged_root().unwrap();
    apply_layer(&merged, &work, &image, 0).unwrap();
    apply_layer(&merged, &work, &image, 1).unwrap();

    let contents = std::fs::read_to_string(merged.path().join("etc/app.conf")).unwrap();
    assert_eq!(contents, "new contents");
}

#[test]
fn whiteout_for_absent_path_is_a_noop() {
    let fixtures = tempfile::tempdir().unwrap();
    let layer0_tar = build_layer_tar(
        fixtures.path(),
        "layer0.tar.gz",
        &[("bin/", ""), ("bin/sh", "#!")],
    );
    let layer1_tar = build_layer_tar(
        fixtures.path(),
        "layer1.tar.gz",
        &[("etc/", ""), ("etc/.wh.never-existed.conf", "")],
    );
    let image = Image::new(vec![
        layer_from_tar(0, &layer0_tar),
        layer_from_tar(1, &layer1_tar),
    ]);

    let work = WorkArea::new().unwrap();
    let merged = work.merged_root().unwrap();
    apply_layer(&merged, &work, &image, 0).unwrap();
    // Must not error even though the whiteout target was never present
    apply_layer(&merged, &work, &image, 1).unwrap();
    assert!(merged.path().join("bin/sh").exists());
    assert!(!merged.path().join("etc/never-existed.conf").exists());
}

#[test]
fn whiteout_removes_directories_recursively() {
    let fixtures = tempfile::tempdir().unwrap();
    let layer0_tar = build_layer_tar(
        fixtures.path(),
        "layer0.tar.gz",
        &[
            ("opt/", ""),
            ("opt/tool/", ""),
            ("opt/tool/bin/", ""),
            ("opt/tool/bin/run", "#!"),
        ],
    );
    let layer1_tar = build_layer_tar(
        fixtures.path(),
        "layer1.tar.gz",
        &[("opt/", ""), ("opt/.wh.tool", "")],
    );
    let image = Image::new(vec![
        layer_from_tar(0, &layer0_tar),
        layer_from_tar(1, &layer1_tar),
    ]);

    let work = WorkArea::new().unwrap();
    let merged = work.merged_root().unwrap();
    apply_layer(&merged, &work, &image, 0).unwrap();
    assert!(merged.path().join("opt/tool/bin/run").exists());

    apply_layer(&merged, &work, &image, 1).unwrap();
    assert!(!merged.path().join("opt/tool").exists());
    assert!(merged.path().join("opt").exists());
}

#[test]
fn missing_layer_archive_aborts_with_extraction_error() {
    let fixtures = tempfile::tempdir().unwrap();
    let layer0_tar = build_layer_tar(
        fixtures.path(),
        "layer0.tar.gz",
        &[("bin/", ""), ("bin/sh", "#!")],
    );
    let layer1 = Layer::new(1, fixtures.path().join("never-written.tar.gz"), "d1");
    let image = Image::new(vec![layer_from_tar(0, &layer0_tar), layer1]);

    let work = WorkArea::new().unwrap();
    let merged = work.merged_root().unwrap();
    apply_layer(&merged, &work, &image, 0).unwrap();

    // An unreadable diff archive is fatal for the run, not absorbed
    let err = apply_layer(&merged, &work, &image, 1).unwrap_err();
    assert!(matches!(err, Error::Extraction { .. }));
    // Prior layers' merged state is left as it was, with no rollback
    assert!(merged.path().join("bin/sh").exists());
}

#[test]
fn corrupt_layer_archive_aborts_with_extraction_error() {
    let fixtures = tempfile::tempdir().unwrap();
    let garbage = fixtures.path().join("layer0.tar.gz");
    // Gzip magic followed by garbage: opens fine, fails during unpack
    std::fs::write(&garbage, [0x1F, 0x8B, 0xFF, 0x00, 0x12, 0x34]).unwrap();
    let image = Image::new(vec![Layer::new(0, &garbage, "d0")]);

    let work = WorkArea::new().unwrap();
    let merged = work.merged_root().unwrap();
    let err = apply_layer(&merged, &work, &image, 0).unwrap_err();
    assert!(matches!(err, Error::Extraction { .. }));
}

#[test]
fn later_layer_overwrites_earlier_file() {
    let fixtures = tempfile::tempdir().unwrap();
    let layer0_tar = build_layer_tar(
        fixtures.path(),
        "layer0.tar.gz",
        &[("etc/", ""), ("etc/os-release", "v1")],
    );
    let layer1_tar = build_layer_tar(
        fixtures.path(),
        "layer1.tar.gz",
        &[("etc/", ""), ("etc/os-release", "v2")],
    );
    let image = Image::new(vec![
        layer_from_tar(0, &layer0_tar),
        layer_from_tar(1, &layer1_tar),
    ]);

    let work = WorkArea::new().unwrap();
    let merged = work.merged_root().unwrap();
    apply_layer(&merged, &work, &image, 0).unwrap();
    apply_layer(&merged, &work, &image, 1).unwrap();

    let contents = std::fs::read_to_string(merged.path().join("etc/os-release")).unwrap();
    assert_eq!(contents, "v2");
}
