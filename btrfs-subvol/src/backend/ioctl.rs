// SPDX-License-Identifier: GPL-3.0-only

use std::ffi::CString;
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use btrfs_subvol_types::{ExtentChange, SubvolumeInfo};

use super::SubvolumeBackend;
use crate::changes::find_updated;
use crate::channel::ControlChannel;
use crate::command::{
    ApiKind, CreateRequest, DeleteRequest, FindNewRequest, ListRequest, SnapshotRequest,
};
use crate::config::SearchConfig;
use crate::enumerate::{ListQuery, list_subvolumes};
use crate::error::{BtrfsError, Result};
use crate::ioctl::Directory;
use crate::records::FIRST_FREE_OBJECTID;
use crate::validators::split_destination;

/// Issues BTRFS ioctls on directory handles opened per request
#[derive(Debug, Clone, Copy, Default)]
pub struct IoctlBackend {
    search: SearchConfig,
}

impl IoctlBackend {
    pub fn new(search: SearchConfig) -> Self {
        Self { search }
    }
}

fn warn_qgroups(qgroups: &[String]) {
    if !qgroups.is_empty() {
        tracing::warn!("Quota groups are not supported, ignoring: {:?}", qgroups);
    }
}

fn destroy(path: &Path) -> Result<()> {
    let (parent, name) = split_destination(path)?;
    tracing::info!("Deleting subvolume: {}", path.display());
    let dir = Directory::open(&parent)?;
    dir.snap_destroy(&name)
        .map_err(BtrfsError::query("SNAP_DESTROY"))
}

/// What the recursive walk does with a directory below the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    /// Another mount, or a directory of some other filesystem
    Skip,
    Descend,
    /// A subvolume root: deleted before its parent and walked for its own children
    Nested,
}

/// Every BTRFS subvolume reports its own anonymous device, so a device change
/// only means another filesystem when the directory is not a subvolume root.
fn classify(ino: u64, dev: u64, parent_dev: u64, mount_root: bool) -> Visit {
    if mount_root {
        Visit::Skip
    } else if ino == FIRST_FREE_OBJECTID {
        Visit::Nested
    } else if dev != parent_dev {
        Visit::Skip
    } else {
        Visit::Descend
    }
}

/// Whether something is mounted on `path`. Kernels without statx report false.
fn is_mount_root(path: &Path) -> io::Result<bool> {
    let name = CString::new(path.as_os_str().as_bytes())?;
    let mut stx = MaybeUninit::<libc::statx>::zeroed();
    // SAFETY: `name` is NUL-terminated and `stx` has room for the whole struct.
    let rc = unsafe {
        libc::statx(
            libc::AT_FDCWD,
            name.as_ptr(),
            libc::AT_SYMLINK_NOFOLLOW,
            libc::STATX_INO,
            stx.as_mut_ptr(),
        )
    };
    if rc != 0 {
        let err = io::Error::last_os_error();
        return match err.raw_os_error() {
            Some(libc::ENOSYS) => Ok(false),
            _ => Err(err),
        };
    }
    // SAFETY: zero is a valid bit pattern for statx and the call filled the rest.
    let stx = unsafe { stx.assume_init() };
    let flag = libc::STATX_ATTR_MOUNT_ROOT as u64;
    Ok(stx.stx_attributes_mask & flag != 0 && stx.stx_attributes & flag != 0)
}

/// Subvolume roots strictly below `root`, deepest first. The walk stays on
/// the filesystem `root` belongs to.
fn nested_subvolumes(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut pending = vec![(root.to_path_buf(), std::fs::metadata(root)?.dev())];
    while let Some((dir, dir_dev)) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let path = entry.path();
            let metadata = entry.metadata()?;
            match classify(metadata.ino(), metadata.dev(), dir_dev, is_mount_root(&path)?) {
                Visit::Skip => tracing::debug!("Not descending into {}", path.display()),
                Visit::Descend => pending.push((path, metadata.dev())),
                Visit::Nested => {
                    found.push(path.clone());
                    pending.push((path, metadata.dev()));
                }
            }
        }
    }
    found.sort_by_key(|path| std::cmp::Reverse(path.components().count()));
    Ok(found)
}

impl SubvolumeBackend for IoctlBackend {
    fn api(&self) -> ApiKind {
        ApiKind::Ioctl
    }

    fn create(&self, request: &CreateRequest) -> Result<()> {
        warn_qgroups(&request.qgroups);
        let (parent, name) = request.target()?;
        tracing::info!("Creating subvolume: {}", request.destination.display());
        let dir = Directory::open(&parent)?;
        dir.subvol_create(&name)
            .map_err(BtrfsError::query("SUBVOL_CREATE"))
    }

    fn snapshot(&self, request: &SnapshotRequest) -> Result<()> {
        warn_qgroups(&request.qgroups);
        let name = request.target_name()?;
        tracing::info!(
            "Creating {}snapshot of {} in {} as '{}'",
            if request.read_only { "read-only " } else { "" },
            request.source.display(),
            request.destination.display(),
            name.to_string_lossy()
        );
        let dir = Directory::open(&request.destination)?;
        dir.snap_create(&request.source, &name, request.read_only)
            .map_err(BtrfsError::query("SNAP_CREATE_V2"))
    }

    fn delete(&self, request: &DeleteRequest) -> Result<()> {
        if request.recursive {
            for nested in nested_subvolumes(&request.destination)? {
                destroy(&nested)?;
            }
        }
        destroy(&request.destination)
    }

    fn find_new(
        &self,
        request: &FindNewRequest,
        on_change: &mut dyn FnMut(ExtentChange),
    ) -> Result<u64> {
        find_updated(&request.destination, request.last_gen, &self.search, on_change)
    }

    fn list(&self, request: &ListRequest, query: &ListQuery) -> Result<Vec<SubvolumeInfo>> {
        let dir = Directory::open(&request.path)?;
        tracing::debug!("Listing subvolumes below {}", dir.path().display());
        list_subvolumes(&dir, query, &self.search)
    }
}
