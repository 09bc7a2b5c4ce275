// SPDX-License-Identifier: GPL-3.0-only

//! Name and path checks run before any ioctl

use std::ffi::{OsStr, OsString};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use nix::sys::statfs::{BTRFS_SUPER_MAGIC, statfs};

use crate::error::{BtrfsError, ValidationError};
use crate::records::FIRST_FREE_OBJECTID;

/// Longest directory entry name a subvolume may have
pub const VOL_NAME_MAX: usize = 255;

pub fn is_subvolume_name(name: &OsStr) -> bool {
    let bytes = name.as_bytes();
    !bytes.is_empty() && !bytes.contains(&b'/') && bytes != b"." && bytes != b".."
}

pub fn validate_subvolume_name(name: impl AsRef<OsStr>) -> Result<(), ValidationError> {
    let name = name.as_ref();
    if !is_subvolume_name(name) {
        return Err(ValidationError::InvalidName(name.to_string_lossy().into_owned()));
    }
    if name.len() > VOL_NAME_MAX {
        return Err(ValidationError::NameTooLong {
            name: name.to_string_lossy().into_owned(),
            max: VOL_NAME_MAX,
        });
    }
    Ok(())
}

/// Split `path` into the directory holding it and its validated entry name.
pub fn split_destination(path: &Path) -> Result<(PathBuf, OsString), ValidationError> {
    let name = path
        .file_name()
        .ok_or_else(|| ValidationError::InvalidName(path.display().to_string()))?;
    validate_subvolume_name(name)?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((parent, name.to_os_string()))
}

/// Whether `path` is the root directory of a btrfs subvolume: a directory on
/// btrfs whose inode number is 256. Missing paths are not subvolumes.
pub fn is_subvolume(path: impl AsRef<Path>) -> Result<bool, ValidationError> {
    let path = path.as_ref();
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(source) => {
            return Err(ValidationError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if !metadata.is_dir() || metadata.ino() != FIRST_FREE_OBJECTID {
        return Ok(false);
    }
    let fs = statfs(path).map_err(|errno| ValidationError::Io {
        path: path.to_path_buf(),
        source: errno.into(),
    })?;
    Ok(fs.filesystem_type() == BTRFS_SUPER_MAGIC)
}

/// Fail unless `path` exists and is a subvolume root.
pub fn require_subvolume(path: impl AsRef<Path>) -> Result<(), BtrfsError> {
    let path = path.as_ref();
    ensure_present(path)?;
    if !is_subvolume(path)? {
        return Err(BtrfsError::NotASubvolume(path.to_path_buf()));
    }
    Ok(())
}

pub fn ensure_present(path: impl AsRef<Path>) -> Result<(), ValidationError> {
    let path = path.as_ref();
    match std::fs::symlink_metadata(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(ValidationError::NotFound(path.to_path_buf()))
        }
        Err(source) => Err(ValidationError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn ensure_absent(path: impl AsRef<Path>) -> Result<(), ValidationError> {
    let path = path.as_ref();
    match std::fs::symlink_metadata(path) {
        Ok(_) => Err(ValidationError::Exists(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ValidationError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subvolume_names() {
        for name in ["", "/", ".", "..", "a/b"] {
            let err = validate_subvolume_name(name).expect_err(name);
            assert_eq!(err.to_string(), format!("incorrect subvolume name '{name}'"));
        }

        let err = validate_subvolume_name("s".repeat(512)).expect_err("too long");
        assert!(err.to_string().contains("max length is 255"));

        assert!(validate_subvolume_name("s".repeat(255)).is_ok());
        assert!(validate_subvolume_name("subvol1").is_ok());
    }

    #[test]
    fn split_destination_defaults_parent_to_cwd() {
        let (parent, name) = split_destination(Path::new("repo")).expect("split");
        assert_eq!(parent, PathBuf::from("."));
        assert_eq!(name, OsString::from("repo"));

        let (parent, name) = split_destination(Path::new("/mnt/pool/repo")).expect("split");
        assert_eq!(parent, PathBuf::from("/mnt/pool"));
        assert_eq!(name, OsString::from("repo"));

        assert!(split_destination(Path::new("/")).is_err());
        assert!(split_destination(Path::new("/mnt/..")).is_err());
    }

    #[test]
    fn plain_directories_are_not_subvolumes() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(!is_subvolume(dir.path()).expect("stat"));
        assert!(!is_subvolume(dir.path().join("missing")).expect("stat"));

        let err = require_subvolume(dir.path().join("missing")).expect_err("missing");
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn presence_checks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = ensure_absent(dir.path()).expect_err("exists");
        assert!(err.to_string().contains("exists"));
        assert!(ensure_absent(dir.path().join("new")).is_ok());
        assert!(ensure_present(dir.path()).is_ok());
    }
}
