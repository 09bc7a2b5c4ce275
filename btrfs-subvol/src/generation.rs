// SPDX-License-Identifier: GPL-3.0-only

use crate::channel::ControlChannel;
use crate::config::SearchConfig;
use crate::error::{BtrfsError, Result};
use crate::records::{FIRST_FREE_OBJECTID, ROOT_ITEM_KEY, ROOT_TREE_OBJECTID, RootItem};
use crate::search::{SearchKey, search_records};

/// Tree id of a subvolume and the highest generation recorded for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootGeneration {
    pub tree_id: u64,
    pub generation: u64,
}

/// Resolve the subvolume owning the channel's directory and its current
/// generation. A subvolume without a ROOT_ITEM reports generation 0.
pub fn resolve_root_generation<C>(channel: &C, config: &SearchConfig) -> Result<RootGeneration>
where
    C: ControlChannel + ?Sized,
{
    let lookup = channel
        .ino_lookup(0, FIRST_FREE_OBJECTID)
        .map_err(BtrfsError::query("INO_LOOKUP"))?;
    let tree_id = lookup.tree_id;

    let key = SearchKey::new(ROOT_TREE_OBJECTID)
        .objectids(tree_id, tree_id)
        .item_types(ROOT_ITEM_KEY, ROOT_ITEM_KEY)
        .items_per_page(config.items_per_page);

    let mut generation = 0;
    for item in search_records::<_, RootItem>(channel, key, ROOT_ITEM_KEY) {
        generation = generation.max(item?.value.generation);
    }

    tracing::debug!("Subvolume tree {} is at generation {}", tree_id, generation);
    Ok(RootGeneration {
        tree_id,
        generation,
    })
}
