// SPDX-License-Identifier: GPL-3.0-only

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A subvolume as seen by the enumerator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubvolumeInfo {
    pub id: u64,
    /// Tree id of the subvolume containing this one; `None` for the top level.
    pub parent_id: Option<u64>,
    pub generation: u64,
    /// Generation at which the subvolume was created (`otransid`).
    pub origin_generation: u64,
    pub uuid: Option<Uuid>,
    pub parent_uuid: Option<Uuid>,
    pub received_uuid: Option<Uuid>,
    pub otime: Option<DateTime<Utc>>,
    /// Path relative to the filesystem top level. Falls back to the bare
    /// directory entry name when the parent chain cannot be resolved.
    pub path: String,
    pub read_only: bool,
    pub is_snapshot: bool,
    pub children: Vec<u64>,
}

/// A file extent written at or after the requested generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtentChange {
    pub inode: u64,
    pub file_offset: u64,
    pub generation: u64,
    pub extent_type: u8,
    pub compression: u8,
    pub ram_bytes: u64,
    pub disk_bytenr: u64,
    pub disk_num_bytes: u64,
    pub extent_offset: u64,
    pub num_bytes: u64,
}

impl ExtentChange {
    pub fn is_inline(&self) -> bool {
        self.extent_type == 0
    }
}

/// Result of a collected find-new scan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindNewReport {
    pub changes: Vec<ExtentChange>,
    /// Watermark to pass as the last generation of the next scan.
    pub generation: u64,
}
