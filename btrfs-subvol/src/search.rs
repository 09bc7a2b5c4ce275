// SPDX-License-Identifier: GPL-3.0-only

//! Paginated TREE_SEARCH
//!
//! The kernel compares item keys as compound `(objectid, type, offset)`
//! tuples against the min and max keys of a [`SearchKey`], so a page may hold
//! items of any type that sorts inside that range. [`TreeSearch`] walks the
//! result buffer item by item, hands each payload to a caller-supplied decode
//! function, and re-issues the query from just past the last returned key
//! until the range is exhausted.

use crate::channel::ControlChannel;
use crate::decode::{ByteCursor, ByteSource, DecodeError, Record};
use crate::error::{BtrfsError, Result};
use crate::records::SearchHeader;

/// Items requested per page unless configured otherwise
pub const DEFAULT_ITEMS_PER_PAGE: u32 = 4096;

/// `struct btrfs_ioctl_search_key`
///
/// The `min_*` objectid, type and offset fields double as the paging cursor.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchKey {
    pub tree_id: u64,
    pub min_objectid: u64,
    pub max_objectid: u64,
    pub min_offset: u64,
    pub max_offset: u64,
    pub min_transid: u64,
    pub max_transid: u64,
    pub min_type: u32,
    pub max_type: u32,
    pub nr_items: u32,
    unused: u32,
    unused1: u64,
    unused2: u64,
    unused3: u64,
    unused4: u64,
}

const _: () = assert!(std::mem::size_of::<SearchKey>() == 104);

impl SearchKey {
    /// A key covering every item of `tree_id`. Tree id 0 searches the tree
    /// owning the directory the query is issued on.
    pub fn new(tree_id: u64) -> Self {
        Self {
            tree_id,
            min_objectid: 0,
            max_objectid: u64::MAX,
            min_offset: 0,
            max_offset: u64::MAX,
            min_transid: 0,
            max_transid: u64::MAX,
            min_type: 0,
            max_type: u32::MAX,
            nr_items: DEFAULT_ITEMS_PER_PAGE,
            unused: 0,
            unused1: 0,
            unused2: 0,
            unused3: 0,
            unused4: 0,
        }
    }

    pub fn objectids(mut self, min: u64, max: u64) -> Self {
        self.min_objectid = min;
        self.max_objectid = max;
        self
    }

    pub fn item_types(mut self, min: u32, max: u32) -> Self {
        self.min_type = min;
        self.max_type = max;
        self
    }

    pub fn offsets(mut self, min: u64, max: u64) -> Self {
        self.min_offset = min;
        self.max_offset = max;
        self
    }

    pub fn transids(mut self, min: u64, max: u64) -> Self {
        self.min_transid = min;
        self.max_transid = max;
        self
    }

    /// Cap the items per page. A page of zero items ends a scan, so the cap
    /// never drops below one.
    pub fn items_per_page(mut self, nr_items: u32) -> Self {
        self.nr_items = nr_items.max(1);
        self
    }

    /// Move the cursor just past `last`, the final key of the previous page.
    ///
    /// Returns `false` once no key after `last` can fall inside `bounds`.
    pub fn advance(&mut self, last: &SearchHeader, bounds: &SearchKey) -> bool {
        self.min_objectid = last.objectid;
        if last.offset < u64::MAX {
            self.min_type = last.item_type;
            self.min_offset = last.offset + 1;
        } else if last.item_type < bounds.max_type {
            self.min_type = last.item_type + 1;
            self.min_offset = 0;
        } else {
            let Some(next) = last.objectid.checked_add(1) else {
                return false;
            };
            self.min_objectid = next;
            self.min_type = bounds.min_type;
            self.min_offset = bounds.min_offset;
        }
        self.min_objectid <= bounds.max_objectid
    }
}

/// A decoded item together with its key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchItem<T> {
    pub header: SearchHeader,
    pub value: T,
}

struct PageState {
    buf: Vec<u8>,
    offset: usize,
    remaining: u32,
    last: Option<SearchHeader>,
}

/// Lazy, single-pass iterator over the items of a tree search
///
/// `decode` receives every item's header and payload and returns `Ok(None)`
/// for items the caller is not interested in. A failed query or a malformed
/// result buffer yields one error and ends the iteration; a payload that
/// fails to decode yields an error and the scan continues with the next
/// item. Items yielded before an error remain valid.
pub struct TreeSearch<'c, C: ?Sized, F> {
    channel: &'c C,
    bounds: SearchKey,
    cursor: SearchKey,
    decode: F,
    page: Option<PageState>,
    pages: usize,
    done: bool,
}

impl<'c, C, F> TreeSearch<'c, C, F>
where
    C: ControlChannel + ?Sized,
{
    pub fn new(channel: &'c C, key: SearchKey, decode: F) -> Self {
        Self {
            channel,
            bounds: key,
            cursor: key,
            decode,
            page: None,
            pages: 0,
            done: false,
        }
    }

    /// Number of queries issued so far.
    pub fn pages(&self) -> usize {
        self.pages
    }

    fn fetch(&mut self) -> Result<bool> {
        let page = self
            .channel
            .tree_search(&self.cursor)
            .map_err(BtrfsError::query("TREE_SEARCH"))?;
        self.pages += 1;
        tracing::debug!(
            "Tree search page {} on tree {}: cursor ({}, {}, {}), {} items",
            self.pages,
            self.cursor.tree_id,
            self.cursor.min_objectid,
            self.cursor.min_type,
            self.cursor.min_offset,
            page.nr_items
        );
        if page.nr_items == 0 {
            return Ok(false);
        }
        self.page = Some(PageState {
            buf: page.buf,
            offset: 0,
            remaining: page.nr_items,
            last: None,
        });
        Ok(true)
    }
}

type Entry = (SearchHeader, usize, usize);

/// Read the next header and the bounds of its payload.
fn next_entry(page: &mut PageState) -> std::result::Result<Entry, DecodeError> {
    let mut cursor = ByteCursor::new(&page.buf);
    cursor.seek_to(page.offset)?;
    let header = SearchHeader::decode(&mut cursor)?;
    let start = cursor.position();
    cursor.take(header.len as usize)?;
    let end = cursor.position();
    page.offset = end;
    page.remaining -= 1;
    page.last = Some(header);
    Ok((header, start, end))
}

impl<C, F, T> Iterator for TreeSearch<'_, C, F>
where
    C: ControlChannel + ?Sized,
    F: FnMut(&SearchHeader, &[u8]) -> std::result::Result<Option<T>, DecodeError>,
{
    type Item = Result<SearchItem<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if let Some(page) = self.page.as_mut() {
                if page.remaining > 0 {
                    let (header, start, end) = match next_entry(page) {
                        Ok(entry) => entry,
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e.into()));
                        }
                    };
                    match (self.decode)(&header, &page.buf[start..end]) {
                        Ok(Some(value)) => return Some(Ok(SearchItem { header, value })),
                        Ok(None) => continue,
                        Err(e) => return Some(Err(e.into())),
                    }
                }

                let last = page.last;
                self.page = None;
                match last {
                    Some(last) if self.cursor.advance(&last, &self.bounds) => {}
                    _ => {
                        self.done = true;
                        continue;
                    }
                }
            }

            match self.fetch() {
                Ok(true) => {}
                Ok(false) => self.done = true,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

/// Search `key` on `channel`, decoding every item whose type is `item_type`
/// as `R` and skipping the rest.
pub fn search_records<'c, C, R>(
    channel: &'c C,
    key: SearchKey,
    item_type: u32,
) -> impl Iterator<Item = Result<SearchItem<R>>> + 'c
where
    C: ControlChannel + ?Sized,
    R: Record + Default + 'c,
{
    TreeSearch::new(channel, key, move |header: &SearchHeader, payload: &[u8]| {
        if header.item_type != item_type {
            return Ok(None);
        }
        crate::decode::decode_payload::<R>(payload).map(Some)
    })
}
