// SPDX-License-Identifier: GPL-3.0-only

//! On-disk item layouts returned by TREE_SEARCH

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::decode::{ByteCursor, DecodeError, Record, decode_payload};

/// Tree holding one ROOT_ITEM per subvolume and snapshot
pub const ROOT_TREE_OBJECTID: u64 = 1;
/// The top-level subvolume
pub const FS_TREE_OBJECTID: u64 = 5;
/// Lowest objectid available to subvolumes, and the inode number of every
/// subvolume root directory
pub const FIRST_FREE_OBJECTID: u64 = 256;
/// Highest objectid available to subvolumes (-256 as u64)
pub const LAST_FREE_OBJECTID: u64 = u64::MAX - 255;

pub const EXTENT_DATA_KEY: u32 = 108;
pub const ROOT_ITEM_KEY: u32 = 132;
pub const ROOT_BACKREF_KEY: u32 = 144;

pub const FILE_EXTENT_INLINE: u8 = 0;
pub const FILE_EXTENT_REG: u8 = 1;
pub const FILE_EXTENT_PREALLOC: u8 = 2;

/// `btrfs_root_item.flags` bit for read-only subvolumes
pub const ROOT_SUBVOL_RDONLY: u64 = 1 << 0;

/// Whether `objectid` names a subvolume tree rather than an internal tree.
pub fn is_subvolume_id(objectid: u64) -> bool {
    objectid == FS_TREE_OBJECTID
        || (FIRST_FREE_OBJECTID..=LAST_FREE_OBJECTID).contains(&objectid)
}

/// Header preceding each item in the TREE_SEARCH result buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Record)]
pub struct SearchHeader {
    pub transid: u64,
    pub objectid: u64,
    pub offset: u64,
    pub item_type: u32,
    pub len: u32,
}

pub const SEARCH_HEADER_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Record)]
pub struct Timespec {
    pub sec: u64,
    pub nsec: u32,
}

impl Timespec {
    /// `None` for the zero timestamp of items that never recorded one.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        if self.sec == 0 && self.nsec == 0 {
            return None;
        }
        DateTime::from_timestamp(i64::try_from(self.sec).ok()?, self.nsec)
    }
}

/// `struct btrfs_root_item`, minus the embedded inode and trailing reserve.
///
/// Items written by old kernels end before `generation_v2`; everything from
/// there on is only read when the payload is long enough. An old kernel that
/// rewrites a newer item leaves `generation_v2` behind `generation`, and
/// [`RootItem::from_payload`] then drops the stale tail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Record)]
pub struct RootItem {
    #[record(seek = 0xa0)]
    pub generation: u64,
    pub root_dirid: u64,
    pub bytenr: u64,
    pub byte_limit: u64,
    pub bytes_used: u64,
    pub last_snapshot: u64,
    pub flags: u64,
    pub refs: u32,
    #[record(seek = 0xed)]
    pub drop_level: u8,
    pub level: u8,
    #[record(extended)]
    pub generation_v2: u64,
    #[record(extended)]
    pub uuid: Uuid,
    #[record(extended)]
    pub parent_uuid: Uuid,
    #[record(extended)]
    pub received_uuid: Uuid,
    #[record(extended)]
    pub ctransid: u64,
    #[record(extended)]
    pub otransid: u64,
    #[record(extended)]
    pub stransid: u64,
    #[record(extended)]
    pub rtransid: u64,
    #[record(extended)]
    pub ctime: Timespec,
    #[record(extended)]
    pub otime: Timespec,
    #[record(extended)]
    pub stime: Timespec,
    #[record(extended)]
    pub rtime: Timespec,
}

impl RootItem {
    /// Decode an item, keeping the extended fields only while
    /// `generation_v2` matches `generation`.
    pub fn from_payload(payload: &[u8]) -> Result<Self, DecodeError> {
        let item: RootItem = decode_payload(payload)?;
        if item.generation_v2 == item.generation {
            return Ok(item);
        }
        Ok(RootItem {
            generation: item.generation,
            root_dirid: item.root_dirid,
            bytenr: item.bytenr,
            byte_limit: item.byte_limit,
            bytes_used: item.bytes_used,
            last_snapshot: item.last_snapshot,
            flags: item.flags,
            refs: item.refs,
            drop_level: item.drop_level,
            level: item.level,
            ..RootItem::default()
        })
    }

    pub fn is_read_only(&self) -> bool {
        self.flags & ROOT_SUBVOL_RDONLY != 0
    }
}

/// `struct btrfs_root_ref`; the entry name follows it in the payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Record)]
pub struct RootRef {
    pub dir_id: u64,
    pub sequence: u64,
    pub name_len: u16,
}

impl RootRef {
    /// Decode the fixed part and slice exactly `name_len` name bytes after it.
    pub fn parse(payload: &[u8]) -> Result<(RootRef, &[u8]), DecodeError> {
        let mut cursor = ByteCursor::new(payload);
        let root_ref = RootRef::decode(&mut cursor)?;
        let name = cursor.take(usize::from(root_ref.name_len))?;
        Ok((root_ref, name))
    }
}

/// `struct btrfs_file_extent_item`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Record)]
pub struct FileExtentItem {
    pub generation: u64,
    pub ram_bytes: u64,
    pub compression: u8,
    pub encryption: u8,
    pub other_encoding: u16,
    pub extent_type: u8,
    #[record(extended)]
    pub disk_bytenr: u64,
    #[record(extended)]
    pub disk_num_bytes: u64,
    #[record(extended)]
    pub offset: u64,
    #[record(extended)]
    pub num_bytes: u64,
}

impl FileExtentItem {
    /// Inline extents store file data where the disk fields would be, so
    /// those are reported as zero.
    pub fn from_payload(payload: &[u8]) -> Result<Self, DecodeError> {
        let mut item: FileExtentItem = decode_payload(payload)?;
        if item.extent_type == FILE_EXTENT_INLINE {
            item.disk_bytenr = 0;
            item.disk_num_bytes = 0;
            item.offset = 0;
            item.num_bytes = 0;
        }
        Ok(item)
    }
}
