// SPDX-License-Identifier: GPL-3.0-only

//! In-memory control channel and recording backend for unit tests

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::ffi::{OsStr, OsString};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use btrfs_subvol_types::{ExtentChange, SubvolumeInfo};
use uuid::Uuid;

use crate::backend::{BackendRegistry, SubvolumeBackend};
use crate::channel::{ControlChannel, InodeLookup, SearchPage};
use crate::ioctl::SEARCH_BUF_SIZE;
use crate::records::{
    EXTENT_DATA_KEY, FIRST_FREE_OBJECTID, ROOT_BACKREF_KEY, ROOT_ITEM_KEY, ROOT_TREE_OBJECTID,
    SEARCH_HEADER_SIZE,
};
use crate::command::{
    ApiKind, Btrfs, CreateRequest, DeleteRequest, FindNewRequest, ListRequest, SnapshotRequest,
};
use crate::enumerate::ListQuery;
use crate::error::Result;
use crate::search::SearchKey;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Recorded {
    TreeSearch { tree_id: u64, min_objectid: u64 },
    InoLookup { tree_id: u64, objectid: u64 },
    Sync,
    SubvolCreate(OsString),
    SnapCreate {
        source: PathBuf,
        name: OsString,
        readonly: bool,
    },
    SnapDestroy(OsString),
}

struct StoredItem {
    transid: u64,
    payload: Vec<u8>,
}

/// Fields of a synthetic ROOT_ITEM
pub(crate) struct RootFixture {
    pub generation: u64,
    pub otransid: u64,
    pub flags: u64,
    pub uuid: Uuid,
    pub parent_uuid: Uuid,
    pub otime: u64,
    pub len: usize,
}

impl Default for RootFixture {
    fn default() -> Self {
        Self {
            generation: 1,
            otransid: 1,
            flags: 0,
            uuid: Uuid::nil(),
            parent_uuid: Uuid::nil(),
            otime: 0,
            len: 439,
        }
    }
}

impl RootFixture {
    fn payload(&self) -> Vec<u8> {
        let mut payload = vec![0u8; 439];
        payload[0xa0..0xa8].copy_from_slice(&self.generation.to_le_bytes());
        payload[0xd0..0xd8].copy_from_slice(&self.flags.to_le_bytes());
        payload[0xef..0xf7].copy_from_slice(&self.generation.to_le_bytes());
        payload[0xf7..0x107].copy_from_slice(self.uuid.as_bytes());
        payload[0x107..0x117].copy_from_slice(self.parent_uuid.as_bytes());
        payload[0x12f..0x137].copy_from_slice(&self.otransid.to_le_bytes());
        payload[0x153..0x15b].copy_from_slice(&self.otime.to_le_bytes());
        payload.truncate(self.len);
        payload
    }
}

/// Emulates the kernel side of TREE_SEARCH and INO_LOOKUP over a sorted
/// item map, and records every call it receives
pub(crate) struct MemoryChannel {
    items: RefCell<BTreeMap<(u64, u64, u32, u64), StoredItem>>,
    lookups: RefCell<HashMap<(u64, u64), String>>,
    own_tree: Cell<u64>,
    fail_search: Cell<Option<i32>>,
    calls: RefCell<Vec<Recorded>>,
}

impl MemoryChannel {
    pub(crate) fn new() -> Self {
        Self {
            items: RefCell::new(BTreeMap::new()),
            lookups: RefCell::new(HashMap::new()),
            own_tree: Cell::new(5),
            fail_search: Cell::new(None),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Tree the channel's directory belongs to; searched for tree id 0.
    pub(crate) fn set_own_tree(&self, tree_id: u64) {
        self.own_tree.set(tree_id);
    }

    pub(crate) fn fail_tree_search(&self, errno: i32) {
        self.fail_search.set(Some(errno));
    }

    pub(crate) fn calls(&self) -> Vec<Recorded> {
        self.calls.borrow().clone()
    }

    pub(crate) fn insert(
        &self,
        tree_id: u64,
        objectid: u64,
        item_type: u32,
        offset: u64,
        payload: Vec<u8>,
    ) {
        self.insert_with_transid(tree_id, objectid, item_type, offset, 1, payload);
    }

    pub(crate) fn insert_with_transid(
        &self,
        tree_id: u64,
        objectid: u64,
        item_type: u32,
        offset: u64,
        transid: u64,
        payload: Vec<u8>,
    ) {
        self.items
            .borrow_mut()
            .insert((tree_id, objectid, item_type, offset), StoredItem { transid, payload });
    }

    pub(crate) fn insert_root_item(&self, objectid: u64, generation: u64, len: usize) {
        self.insert_root(
            objectid,
            RootFixture {
                generation,
                len,
                ..RootFixture::default()
            },
        );
    }

    pub(crate) fn insert_root(&self, objectid: u64, fixture: RootFixture) {
        self.insert(ROOT_TREE_OBJECTID, objectid, ROOT_ITEM_KEY, 0, fixture.payload());
    }

    pub(crate) fn insert_root_backref(&self, objectid: u64, parent: u64, dir_id: u64, name: &str) {
        let mut payload = Vec::new();
        payload.extend_from_slice(&dir_id.to_le_bytes());
        payload.extend_from_slice(&0u64.to_le_bytes());
        payload.extend_from_slice(&(name.len() as u16).to_le_bytes());
        payload.extend_from_slice(name.as_bytes());
        self.insert(ROOT_TREE_OBJECTID, objectid, ROOT_BACKREF_KEY, parent, payload);
    }

    /// A regular or inline file extent in the channel's own tree.
    pub(crate) fn insert_extent(
        &self,
        inode: u64,
        file_offset: u64,
        generation: u64,
        extent_type: u8,
    ) {
        let mut payload = Vec::new();
        payload.extend_from_slice(&generation.to_le_bytes());
        payload.extend_from_slice(&4096u64.to_le_bytes());
        payload.extend_from_slice(&[0, 0, 0, 0, extent_type]);
        if extent_type == crate::records::FILE_EXTENT_INLINE {
            payload.extend_from_slice(&[0x5a; 40]);
        } else {
            for value in [1_048_576u64, 4096, 0, 4096] {
                payload.extend_from_slice(&value.to_le_bytes());
            }
        }
        let tree_id = self.own_tree.get();
        self.insert_with_transid(tree_id, inode, EXTENT_DATA_KEY, file_offset, generation, payload);
    }

    /// Answer INO_LOOKUP(tree_id, dir_id) with `path`.
    pub(crate) fn set_dir_path(&self, tree_id: u64, dir_id: u64, path: &str) {
        self.lookups
            .borrow_mut()
            .insert((tree_id, dir_id), path.to_string());
    }

    fn record(&self, call: Recorded) {
        self.calls.borrow_mut().push(call);
    }
}

impl ControlChannel for MemoryChannel {
    fn tree_search(&self, key: &SearchKey) -> io::Result<SearchPage> {
        self.record(Recorded::TreeSearch {
            tree_id: key.tree_id,
            min_objectid: key.min_objectid,
        });
        if let Some(errno) = self.fail_search.get() {
            return Err(io::Error::from_raw_os_error(errno));
        }

        let tree_id = if key.tree_id == 0 {
            self.own_tree.get()
        } else {
            key.tree_id
        };
        let min = (tree_id, key.min_objectid, key.min_type, key.min_offset);
        let max = (tree_id, key.max_objectid, key.max_type, key.max_offset);

        let mut page = SearchPage::default();
        if min > max {
            return Ok(page);
        }

        for (&(_, objectid, item_type, offset), item) in self.items.borrow().range(min..=max) {
            if page.nr_items >= key.nr_items {
                break;
            }
            if item.transid < key.min_transid || item.transid > key.max_transid {
                continue;
            }
            if page.buf.len() + SEARCH_HEADER_SIZE + item.payload.len() > SEARCH_BUF_SIZE {
                break;
            }
            page.buf.extend_from_slice(&item.transid.to_le_bytes());
            page.buf.extend_from_slice(&objectid.to_le_bytes());
            page.buf.extend_from_slice(&offset.to_le_bytes());
            page.buf.extend_from_slice(&item_type.to_le_bytes());
            page.buf.extend_from_slice(&(item.payload.len() as u32).to_le_bytes());
            page.buf.extend_from_slice(&item.payload);
            page.nr_items += 1;
        }
        page.buf.resize(SEARCH_BUF_SIZE, 0);
        Ok(page)
    }

    fn ino_lookup(&self, tree_id: u64, objectid: u64) -> io::Result<InodeLookup> {
        self.record(Recorded::InoLookup { tree_id, objectid });
        let tree_id = if tree_id == 0 {
            self.own_tree.get()
        } else {
            tree_id
        };
        match self.lookups.borrow().get(&(tree_id, objectid)) {
            Some(path) => Ok(InodeLookup {
                tree_id,
                path: path.clone(),
            }),
            None if objectid == FIRST_FREE_OBJECTID => Ok(InodeLookup {
                tree_id,
                path: String::new(),
            }),
            None => Err(io::Error::from_raw_os_error(libc::ENOENT)),
        }
    }

    fn sync(&self) -> io::Result<()> {
        self.record(Recorded::Sync);
        Ok(())
    }

    fn subvol_create(&self, name: &OsStr) -> io::Result<()> {
        self.record(Recorded::SubvolCreate(name.to_os_string()));
        Ok(())
    }

    fn snap_create(&self, source: &Path, name: &OsStr, readonly: bool) -> io::Result<()> {
        self.record(Recorded::SnapCreate {
            source: source.to_path_buf(),
            name: name.to_os_string(),
            readonly,
        });
        Ok(())
    }

    fn snap_destroy(&self, name: &OsStr) -> io::Result<()> {
        self.record(Recorded::SnapDestroy(name.to_os_string()));
        Ok(())
    }
}

/// Backend that records rendered requests instead of touching a filesystem
#[derive(Default)]
pub(crate) struct RecordingBackend {
    calls: Mutex<Vec<String>>,
}

impl RecordingBackend {
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl SubvolumeBackend for RecordingBackend {
    fn api(&self) -> ApiKind {
        ApiKind::Ioctl
    }

    fn create(&self, request: &CreateRequest) -> Result<()> {
        self.record(format!("create {}", request));
        Ok(())
    }

    fn snapshot(&self, request: &SnapshotRequest) -> Result<()> {
        self.record(format!("snapshot {}", request));
        Ok(())
    }

    fn delete(&self, request: &DeleteRequest) -> Result<()> {
        self.record(format!("delete {}", request));
        Ok(())
    }

    fn find_new(
        &self,
        request: &FindNewRequest,
        on_change: &mut dyn FnMut(ExtentChange),
    ) -> Result<u64> {
        self.record(format!("find_new {}", request));
        on_change(ExtentChange {
            inode: 257,
            file_offset: 0,
            generation: request.last_gen,
            extent_type: crate::records::FILE_EXTENT_REG,
            compression: 0,
            ram_bytes: 4096,
            disk_bytenr: 1_048_576,
            disk_num_bytes: 4096,
            extent_offset: 0,
            num_bytes: 4096,
        });
        Ok(request.last_gen + 1)
    }

    fn list(&self, request: &ListRequest, _query: &ListQuery) -> Result<Vec<SubvolumeInfo>> {
        self.record(format!("list {}", request));
        Ok(Vec::new())
    }
}

/// A façade whose ioctl routes all lead to one recording backend; the CLI
/// API has no routes at all.
pub(crate) fn recording_btrfs(api: ApiKind) -> (Btrfs, Arc<RecordingBackend>) {
    let backend = Arc::new(RecordingBackend::default());
    let registry = BackendRegistry::builder()
        .register_all(ApiKind::Ioctl, backend.clone())
        .build();
    (Btrfs::with_registry(api, Arc::new(registry)), backend)
}
