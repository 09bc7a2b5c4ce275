// SPDX-License-Identifier: GPL-3.0-only

//! Subvolume enumeration over the root tree
//!
//! Every subvolume owns one ROOT_ITEM in tree 1 keyed by its id, and one
//! ROOT_BACKREF keyed by its id with the parent's id as offset. The backref
//! carries the directory (in the parent) holding the subvolume and the entry
//! name, which is all that is needed to rebuild paths.

use std::collections::{BTreeMap, HashMap, HashSet};

use btrfs_subvol_types::{GenerationFilter, ListOrder, SubvolumeInfo};

use crate::channel::ControlChannel;
use crate::config::SearchConfig;
use crate::decode::DecodeError;
use crate::error::{BtrfsError, Result};
use crate::records::{
    FIRST_FREE_OBJECTID, FS_TREE_OBJECTID, ROOT_BACKREF_KEY, ROOT_ITEM_KEY, ROOT_TREE_OBJECTID,
    RootItem, RootRef, SearchHeader, is_subvolume_id,
};
use crate::search::{SearchKey, TreeSearch};

/// Filters and ordering applied to a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    pub generation: Option<GenerationFilter>,
    pub origin_generation: Option<GenerationFilter>,
    pub order: ListOrder,
}

impl ListQuery {
    fn accepts(&self, info: &SubvolumeInfo) -> bool {
        self.generation
            .is_none_or(|filter| filter.matches(info.generation))
            && self
                .origin_generation
                .is_none_or(|filter| filter.matches(info.origin_generation))
    }
}

enum RootEntry {
    Item(Box<RootItem>),
    Backref(Backref),
}

#[derive(Debug, Clone)]
struct Backref {
    parent: u64,
    dir_id: u64,
    name: String,
}

#[derive(Default)]
struct Pending {
    item: Option<Box<RootItem>>,
    backref: Option<Backref>,
}

fn decode_entry(
    header: &SearchHeader,
    payload: &[u8],
) -> std::result::Result<Option<RootEntry>, DecodeError> {
    if !is_subvolume_id(header.objectid) {
        return Ok(None);
    }
    match header.item_type {
        ROOT_ITEM_KEY => {
            let item = RootItem::from_payload(payload)?;
            Ok(Some(RootEntry::Item(Box::new(item))))
        }
        ROOT_BACKREF_KEY => {
            let (root_ref, name) = RootRef::parse(payload)?;
            Ok(Some(RootEntry::Backref(Backref {
                parent: header.offset,
                dir_id: root_ref.dir_id,
                name: String::from_utf8_lossy(name).into_owned(),
            })))
        }
        _ => Ok(None),
    }
}

/// Rebuilds paths relative to the filesystem top level
struct PathResolver<'c, C: ?Sized> {
    channel: &'c C,
    backrefs: HashMap<u64, Backref>,
    resolved: HashMap<u64, Option<String>>,
}

impl<C: ControlChannel + ?Sized> PathResolver<'_, C> {
    fn resolve(&mut self, id: u64, visiting: &mut HashSet<u64>) -> Option<String> {
        if id == FS_TREE_OBJECTID {
            return Some(String::new());
        }
        if let Some(path) = self.resolved.get(&id) {
            return path.clone();
        }
        if !visiting.insert(id) {
            return None;
        }

        let path = self.backrefs.get(&id).cloned().and_then(|backref| {
            let dir = match self.channel.ino_lookup(backref.parent, backref.dir_id) {
                Ok(lookup) => lookup.path,
                Err(e) => {
                    tracing::warn!(
                        "Cannot resolve directory {} in tree {}: {}",
                        backref.dir_id,
                        backref.parent,
                        e
                    );
                    return None;
                }
            };
            let parent = self.resolve(backref.parent, visiting)?;
            let mut path = parent;
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(&dir);
            path.push_str(&backref.name);
            Some(path)
        });

        visiting.remove(&id);
        self.resolved.insert(id, path.clone());
        path
    }

    fn path_of(&mut self, id: u64) -> String {
        if let Some(path) = self.resolve(id, &mut HashSet::new()) {
            return path;
        }
        let name = self
            .backrefs
            .get(&id)
            .map(|backref| backref.name.clone())
            .unwrap_or_default();
        tracing::warn!("Incomplete path for subvolume {}, using '{}'", id, name);
        name
    }
}

fn descends_from(id: u64, ancestor: u64, parents: &HashMap<u64, u64>) -> bool {
    let mut current = id;
    let mut steps = 0;
    while current != ancestor {
        match parents.get(&current) {
            Some(&parent) if steps < parents.len() => {
                current = parent;
                steps += 1;
            }
            _ => return false,
        }
    }
    true
}

/// List the subvolume owning the channel's directory and every subvolume
/// nested below it. The top-level subvolume itself is never listed.
pub fn list_subvolumes<C>(
    channel: &C,
    query: &ListQuery,
    config: &SearchConfig,
) -> Result<Vec<SubvolumeInfo>>
where
    C: ControlChannel + ?Sized,
{
    let owner = channel
        .ino_lookup(0, FIRST_FREE_OBJECTID)
        .map_err(BtrfsError::query("INO_LOOKUP"))?
        .tree_id;

    let key = SearchKey::new(ROOT_TREE_OBJECTID)
        .item_types(ROOT_ITEM_KEY, ROOT_BACKREF_KEY)
        .items_per_page(config.items_per_page);

    let mut pending: BTreeMap<u64, Pending> = BTreeMap::new();
    for entry in TreeSearch::new(channel, key, decode_entry) {
        let entry = entry?;
        let slot = pending.entry(entry.header.objectid).or_default();
        match entry.value {
            RootEntry::Item(item) => slot.item = Some(item),
            RootEntry::Backref(backref) => {
                slot.backref.get_or_insert(backref);
            }
        }
    }

    // Roots without a backref are deleted subvolumes awaiting cleanup.
    let roots: BTreeMap<u64, (Box<RootItem>, Backref)> = pending
        .into_iter()
        .filter_map(|(id, pending)| Some((id, (pending.item?, pending.backref?))))
        .collect();

    let parents: HashMap<u64, u64> = roots
        .iter()
        .map(|(id, (_, backref))| (*id, backref.parent))
        .collect();
    let mut children: HashMap<u64, Vec<u64>> = HashMap::new();
    for (id, parent) in &parents {
        children.entry(*parent).or_default().push(*id);
    }

    let mut resolver = PathResolver {
        channel,
        backrefs: roots
            .iter()
            .map(|(id, (_, backref))| (*id, backref.clone()))
            .collect(),
        resolved: HashMap::new(),
    };

    let mut subvolumes = Vec::new();
    for (id, (item, backref)) in &roots {
        if !descends_from(*id, owner, &parents) {
            continue;
        }
        let mut child_ids = children.get(id).cloned().unwrap_or_default();
        child_ids.sort_unstable();

        let info = SubvolumeInfo {
            id: *id,
            parent_id: Some(backref.parent),
            generation: item.generation,
            origin_generation: item.otransid,
            uuid: Some(item.uuid).filter(|uuid| !uuid.is_nil()),
            parent_uuid: Some(item.parent_uuid).filter(|uuid| !uuid.is_nil()),
            received_uuid: Some(item.received_uuid).filter(|uuid| !uuid.is_nil()),
            otime: item.otime.to_datetime(),
            path: resolver.path_of(*id),
            read_only: item.is_read_only(),
            is_snapshot: !item.parent_uuid.is_nil(),
            children: child_ids,
        };
        if query.accepts(&info) {
            subvolumes.push(info);
        }
    }

    query.order.sort(&mut subvolumes);
    tracing::debug!(
        "Listed {} subvolumes under tree {}",
        subvolumes.len(),
        owner
    );
    Ok(subvolumes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryChannel, RootFixture};
    use btrfs_subvol_types::SortKey;
    use uuid::Uuid;

    /// top level 5
    ///   repo (256)            at /repo
    ///     master (257)        at /repo/master
    ///     commit0 (258)       at /repo/snaps/commit0, snapshot of master
    ///   other (259)           at /other
    fn fixture() -> MemoryChannel {
        let channel = MemoryChannel::new();
        channel.insert_root_item(5, 100, 439);
        channel.insert_root(
            256,
            RootFixture {
                generation: 50,
                otransid: 10,
                uuid: Uuid::from_bytes([1; 16]),
                ..RootFixture::default()
            },
        );
        channel.insert_root(
            257,
            RootFixture {
                generation: 60,
                otransid: 11,
                uuid: Uuid::from_bytes([2; 16]),
                otime: 1_700_000_000,
                ..RootFixture::default()
            },
        );
        channel.insert_root(
            258,
            RootFixture {
                generation: 61,
                otransid: 12,
                flags: crate::records::ROOT_SUBVOL_RDONLY,
                uuid: Uuid::from_bytes([3; 16]),
                parent_uuid: Uuid::from_bytes([2; 16]),
                ..RootFixture::default()
            },
        );
        channel.insert_root_item(259, 70, 0xef);

        channel.insert_root_backref(256, 5, 256, "repo");
        channel.insert_root_backref(257, 256, 256, "master");
        channel.insert_root_backref(258, 256, 300, "commit0");
        channel.insert_root_backref(259, 5, 256, "other");
        channel.set_dir_path(256, 300, "snaps/");

        // orphaned root awaiting cleanup, and an internal tree
        channel.insert_root_item(260, 80, 439);
        channel.insert_root_item(7, 5, 439);
        channel
    }

    fn ids(list: &[SubvolumeInfo]) -> Vec<u64> {
        list.iter().map(|info| info.id).collect()
    }

    #[test]
    fn lists_everything_below_the_top_level() {
        let channel = fixture();
        let list = list_subvolumes(&channel, &ListQuery::default(), &SearchConfig::default())
            .expect("list");

        assert_eq!(ids(&list), vec![256, 257, 258, 259]);
        let paths: Vec<&str> = list.iter().map(|info| info.path.as_str()).collect();
        assert_eq!(paths, vec!["repo", "repo/master", "repo/snaps/commit0", "other"]);

        let repo = &list[0];
        assert_eq!(repo.parent_id, Some(5));
        assert_eq!(repo.children, vec![257, 258]);
        assert_eq!(repo.uuid, Some(Uuid::from_bytes([1; 16])));
        assert!(!repo.is_snapshot);

        let commit0 = &list[2];
        assert!(commit0.is_snapshot);
        assert!(commit0.read_only);
        assert_eq!(commit0.parent_uuid, Some(Uuid::from_bytes([2; 16])));

        assert_eq!(list[1].otime.map(|t| t.timestamp()), Some(1_700_000_000));

        let other = &list[3];
        assert_eq!(other.uuid, None);
        assert_eq!(other.generation, 70);
    }

    #[test]
    fn scopes_to_the_owning_subvolume() {
        let channel = fixture();
        channel.set_own_tree(256);

        let list = list_subvolumes(&channel, &ListQuery::default(), &SearchConfig::default())
            .expect("list");
        assert_eq!(ids(&list), vec![256, 257, 258]);
    }

    #[test]
    fn applies_filters_and_order() {
        let channel = fixture();
        let query = ListQuery {
            generation: Some(GenerationFilter::AtLeast(60)),
            origin_generation: Some(GenerationFilter::AtMost(11)),
            order: ListOrder {
                fields: vec![btrfs_subvol_types::SortField {
                    key: SortKey::Generation,
                    descending: true,
                }],
            },
        };
        // 259 has a legacy item, so its otransid reads as zero
        let list = list_subvolumes(&channel, &query, &SearchConfig::default()).expect("list");
        assert_eq!(ids(&list), vec![259, 257]);
    }

    #[test]
    fn unresolvable_directory_falls_back_to_the_name() {
        let channel = MemoryChannel::new();
        channel.insert_root_item(256, 1, 439);
        channel.insert_root_item(257, 1, 439);
        channel.insert_root_backref(256, 5, 256, "repo");
        channel.insert_root_backref(257, 256, 999, "lost");

        let list = list_subvolumes(&channel, &ListQuery::default(), &SearchConfig::default())
            .expect("list");
        assert_eq!(list[1].path, "lost");
        assert_eq!(list[1].parent_id, Some(256));
    }

    #[test]
    fn zero_page_size_still_lists_everything() {
        let channel = fixture();
        let config = SearchConfig { items_per_page: 0 };
        let list = list_subvolumes(&channel, &ListQuery::default(), &config).expect("list");
        assert_eq!(ids(&list), vec![256, 257, 258, 259]);
    }

    #[test]
    fn small_pages_give_the_same_listing() {
        let channel = fixture();
        let config = SearchConfig { items_per_page: 1 };
        let list = list_subvolumes(&channel, &ListQuery::default(), &config).expect("list");
        assert_eq!(ids(&list), vec![256, 257, 258, 259]);
    }
}
