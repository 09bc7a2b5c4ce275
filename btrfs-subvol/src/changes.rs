// SPDX-License-Identifier: GPL-3.0-only

//! Incremental change detection ("find-new")

use std::path::Path;

use btrfs_subvol_types::ExtentChange;

use crate::channel::ControlChannel;
use crate::config::SearchConfig;
use crate::decode::DecodeError;
use crate::error::{BtrfsError, Result};
use crate::generation::resolve_root_generation;
use crate::ioctl::Directory;
use crate::records::{EXTENT_DATA_KEY, FileExtentItem, SearchHeader};
use crate::search::{SearchKey, TreeSearch};
use crate::validators;

fn to_change(header: &SearchHeader, item: &FileExtentItem) -> ExtentChange {
    ExtentChange {
        inode: header.objectid,
        file_offset: header.offset,
        generation: item.generation,
        extent_type: item.extent_type,
        compression: item.compression,
        ram_bytes: item.ram_bytes,
        disk_bytenr: item.disk_bytenr,
        disk_num_bytes: item.disk_num_bytes,
        extent_offset: item.offset,
        num_bytes: item.num_bytes,
    }
}

/// Report every file extent of the subvolume at `path` written at or after
/// `last_gen`, returning the subvolume's current generation as the watermark
/// for the next call.
pub fn find_updated<F>(
    path: impl AsRef<Path>,
    last_gen: u64,
    config: &SearchConfig,
    on_change: F,
) -> Result<u64>
where
    F: FnMut(ExtentChange),
{
    let path = path.as_ref();
    if !validators::is_subvolume(path)? {
        return Err(BtrfsError::NotASubvolume(path.to_path_buf()));
    }
    let dir = Directory::open(path)?;
    scan_updated(&dir, last_gen, config, on_change)
}

/// [`find_updated`] against an already open channel.
pub fn scan_updated<C, F>(
    channel: &C,
    last_gen: u64,
    config: &SearchConfig,
    mut on_change: F,
) -> Result<u64>
where
    C: ControlChannel + ?Sized,
    F: FnMut(ExtentChange),
{
    channel.sync().map_err(BtrfsError::query("SYNC"))?;
    let watermark = resolve_root_generation(channel, config)?;

    let key = SearchKey::new(0)
        .item_types(EXTENT_DATA_KEY, EXTENT_DATA_KEY)
        .transids(last_gen, u64::MAX)
        .items_per_page(config.items_per_page);

    let search = TreeSearch::new(channel, key, |header: &SearchHeader, payload: &[u8]| {
        if header.item_type != EXTENT_DATA_KEY {
            return Ok::<_, DecodeError>(None);
        }
        FileExtentItem::from_payload(payload).map(|item| Some(to_change(header, &item)))
    });

    let mut reported = 0usize;
    for item in search {
        let change = item?.value;
        if change.generation >= last_gen {
            reported += 1;
            on_change(change);
        }
    }

    tracing::debug!(
        "Found {} changed extents since generation {}, watermark {}",
        reported,
        last_gen,
        watermark.generation
    );
    Ok(watermark.generation)
}
