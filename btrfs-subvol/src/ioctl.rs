// SPDX-License-Identifier: GPL-3.0-only

//! BTRFS ioctl bindings and the directory handle they are issued on

use std::ffi::OsStr;
use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use crate::channel::{ControlChannel, InodeLookup, SearchPage};
use crate::error::{BtrfsError, Result};
use crate::search::SearchKey;

pub const SEARCH_BUF_SIZE: usize = 4096 - std::mem::size_of::<SearchKey>();
pub const SUBVOL_RDONLY: u64 = 1 << 1;

const PATH_NAME_MAX: usize = 4087;
const SUBVOL_NAME_MAX: usize = 4039;
const INO_LOOKUP_PATH_MAX: usize = 4080;

#[repr(C)]
pub struct VolArgs {
    pub fd: i64,
    pub name: [u8; PATH_NAME_MAX + 1],
}

#[repr(C)]
pub struct VolArgsV2 {
    pub fd: i64,
    pub transid: u64,
    pub flags: u64,
    pub unused: [u64; 4],
    pub name: [u8; SUBVOL_NAME_MAX + 1],
}

#[repr(C)]
pub struct InoLookupArgs {
    pub treeid: u64,
    pub objectid: u64,
    pub name: [u8; INO_LOOKUP_PATH_MAX],
}

#[repr(C)]
pub struct SearchArgs {
    pub key: SearchKey,
    pub buf: [u8; SEARCH_BUF_SIZE],
}

const _: () = assert!(std::mem::size_of::<VolArgs>() == 4096);
const _: () = assert!(std::mem::size_of::<VolArgsV2>() == 4096);
const _: () = assert!(std::mem::size_of::<InoLookupArgs>() == 4096);
const _: () = assert!(std::mem::size_of::<SearchArgs>() == 4096);

mod sys {
    use nix::{ioctl_none, ioctl_readwrite, ioctl_write_ptr};

    const BTRFS_IOCTL_MAGIC: u8 = 0x94;

    ioctl_none!(btrfs_sync, BTRFS_IOCTL_MAGIC, 8);
    ioctl_write_ptr!(btrfs_subvol_create, BTRFS_IOCTL_MAGIC, 14, super::VolArgs);
    ioctl_write_ptr!(btrfs_snap_destroy, BTRFS_IOCTL_MAGIC, 15, super::VolArgs);
    ioctl_readwrite!(btrfs_tree_search, BTRFS_IOCTL_MAGIC, 17, super::SearchArgs);
    ioctl_readwrite!(btrfs_ino_lookup, BTRFS_IOCTL_MAGIC, 18, super::InoLookupArgs);
    ioctl_write_ptr!(btrfs_snap_create_v2, BTRFS_IOCTL_MAGIC, 23, super::VolArgsV2);
}

/// Copy `name` into a fixed NUL-terminated field.
fn copy_name(dst: &mut [u8], name: &OsStr) -> io::Result<()> {
    let bytes = name.as_bytes();
    if bytes.len() >= dst.len() || bytes.contains(&0) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("name does not fit the ioctl argument: {}", name.to_string_lossy()),
        ));
    }
    dst[..bytes.len()].copy_from_slice(bytes);
    dst[bytes.len()] = 0;
    Ok(())
}

impl VolArgs {
    fn new(name: &OsStr) -> io::Result<Self> {
        let mut args = VolArgs {
            fd: 0,
            name: [0; PATH_NAME_MAX + 1],
        };
        copy_name(&mut args.name, name)?;
        Ok(args)
    }
}

/// An open directory on a btrfs filesystem; the handle is closed on drop
#[derive(Debug)]
pub struct Directory {
    path: PathBuf,
    file: File,
}

impl Directory {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_DIRECTORY)
            .open(&path)
            .map_err(|source| BtrfsError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ControlChannel for Directory {
    fn tree_search(&self, key: &SearchKey) -> io::Result<SearchPage> {
        let mut args = Box::new(SearchArgs {
            key: *key,
            buf: [0; SEARCH_BUF_SIZE],
        });
        // SAFETY: `args` is a valid, exclusively borrowed search_args for the call.
        unsafe { sys::btrfs_tree_search(self.file.as_raw_fd(), &mut *args) }
            .map_err(io::Error::from)?;
        Ok(SearchPage {
            nr_items: args.key.nr_items,
            buf: args.buf.to_vec(),
        })
    }

    fn ino_lookup(&self, tree_id: u64, objectid: u64) -> io::Result<InodeLookup> {
        let mut args = InoLookupArgs {
            treeid: tree_id,
            objectid,
            name: [0; INO_LOOKUP_PATH_MAX],
        };
        // SAFETY: `args` is a valid ino_lookup_args for the duration of the call.
        unsafe { sys::btrfs_ino_lookup(self.file.as_raw_fd(), &mut args) }
            .map_err(io::Error::from)?;
        let end = args.name.iter().position(|b| *b == 0).unwrap_or(args.name.len());
        Ok(InodeLookup {
            tree_id: args.treeid,
            path: String::from_utf8_lossy(&args.name[..end]).into_owned(),
        })
    }

    fn sync(&self) -> io::Result<()> {
        // SAFETY: BTRFS_IOC_SYNC takes no argument.
        unsafe { sys::btrfs_sync(self.file.as_raw_fd()) }.map_err(io::Error::from)?;
        Ok(())
    }

    fn subvol_create(&self, name: &OsStr) -> io::Result<()> {
        let args = VolArgs::new(name)?;
        // SAFETY: `args` outlives the call and the kernel only reads it.
        unsafe { sys::btrfs_subvol_create(self.file.as_raw_fd(), &args) }
            .map_err(io::Error::from)?;
        Ok(())
    }

    fn snap_create(&self, source: &Path, name: &OsStr, readonly: bool) -> io::Result<()> {
        let source = OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_DIRECTORY)
            .open(source)?;
        let mut args = VolArgsV2 {
            fd: i64::from(source.as_raw_fd()),
            transid: 0,
            flags: if readonly { SUBVOL_RDONLY } else { 0 },
            unused: [0; 4],
            name: [0; SUBVOL_NAME_MAX + 1],
        };
        copy_name(&mut args.name, name)?;
        // SAFETY: `args` and the source descriptor stay valid for the call.
        unsafe { sys::btrfs_snap_create_v2(self.file.as_raw_fd(), &args) }
            .map_err(io::Error::from)?;
        Ok(())
    }

    fn snap_destroy(&self, name: &OsStr) -> io::Result<()> {
        let args = VolArgs::new(name)?;
        // SAFETY: `args` outlives the call and the kernel only reads it.
        unsafe { sys::btrfs_snap_destroy(self.file.as_raw_fd(), &args) }
            .map_err(io::Error::from)?;
        Ok(())
    }
}
