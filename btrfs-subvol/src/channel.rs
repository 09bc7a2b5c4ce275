// SPDX-License-Identifier: GPL-3.0-only

use std::ffi::OsStr;
use std::io;
use std::path::Path;

use crate::search::SearchKey;

/// One TREE_SEARCH result: the number of items the kernel copied and the raw
/// result buffer holding them
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub nr_items: u32,
    pub buf: Vec<u8>,
}

/// Answer to INO_LOOKUP
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InodeLookup {
    /// Tree owning the inode
    pub tree_id: u64,
    /// Path of the inode's directory relative to that tree's root; empty for
    /// the root itself, otherwise terminated by `/`
    pub path: String,
}

/// Kernel control operations issued against one open directory
///
/// Names passed to the create/destroy calls are single directory entries
/// below that directory.
pub trait ControlChannel {
    fn tree_search(&self, key: &SearchKey) -> io::Result<SearchPage>;

    fn ino_lookup(&self, tree_id: u64, objectid: u64) -> io::Result<InodeLookup>;

    fn sync(&self) -> io::Result<()>;

    fn subvol_create(&self, name: &OsStr) -> io::Result<()>;

    fn snap_create(&self, source: &Path, name: &OsStr, readonly: bool) -> io::Result<()>;

    fn snap_destroy(&self, name: &OsStr) -> io::Result<()>;
}
