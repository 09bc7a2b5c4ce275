// SPDX-License-Identifier: GPL-3.0-only

//! Command checks that fail before any ioctl is issued, so they run on any
//! filesystem.

use btrfs_subvol::{ApiKind, Btrfs, BtrfsConfig, BtrfsError};

#[test]
fn create_rejects_an_existing_destination() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("repo")).expect("mkdir");

    let err = Btrfs::ioctl()
        .subvolume()
        .create()
        .destination(dir.path().join("repo"))
        .execute()
        .expect_err("exists");
    assert!(err.is_validation());
    assert_eq!(
        err.to_string(),
        format!(
            "ERROR subvolume create: '{0}' exists, args=(qgroups=[], dest='{0}')",
            dir.path().join("repo").display()
        )
    );
}

#[test]
fn snapshot_requires_a_subvolume_source() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir(dir.path().join("plain")).expect("mkdir");

    let err = Btrfs::ioctl()
        .subvolume()
        .snapshot()
        .source(dir.path().join("plain"))
        .destination(dir.path())
        .execute()
        .expect_err("not a subvolume");
    assert!(matches!(err.cause(), BtrfsError::NotASubvolume(_)));

    let err = Btrfs::ioctl()
        .subvolume()
        .snapshot()
        .source(dir.path().join("missing"))
        .destination(dir.path())
        .execute()
        .expect_err("missing source");
    assert!(err.to_string().contains("not found"));
}

#[test]
fn delete_and_list_report_missing_paths() {
    let dir = tempfile::tempdir().expect("tempdir");
    let btrfs = Btrfs::ioctl();

    let err = btrfs
        .subvolume()
        .delete()
        .destination(dir.path().join("gone"))
        .execute()
        .expect_err("not found");
    assert!(err.is_validation());

    let err = btrfs
        .subvolume()
        .list()
        .path(dir.path().join("gone"))
        .execute()
        .expect_err("not found");
    assert!(err.is_validation());
}

#[test]
fn find_new_on_a_plain_directory_is_not_a_subvolume() {
    let dir = tempfile::tempdir().expect("tempdir");

    let err = Btrfs::ioctl()
        .subvolume()
        .find_new()
        .destination(dir.path())
        .last_gen(1)
        .execute()
        .expect_err("not a subvolume");
    assert!(matches!(err.cause(), BtrfsError::NotASubvolume(_)));
    assert!(!err.is_validation());
}

#[test]
fn cli_api_only_routes_create() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = BtrfsConfig::from_toml_str("api = \"cli\"").expect("config");
    let btrfs = Btrfs::new(&config);
    assert_eq!(btrfs.api(), ApiKind::Cli);

    let err = btrfs
        .subvolume()
        .find_new()
        .destination(dir.path())
        .execute()
        .expect_err("unsupported");
    assert!(matches!(
        err.cause(),
        BtrfsError::UnsupportedOperation { .. }
    ));

    let err = btrfs
        .subvolume()
        .create()
        .destination(dir.path().join("repo"))
        .execute()
        .expect_err("unimplemented");
    assert!(matches!(err.cause(), BtrfsError::Unimplemented { .. }));
}
