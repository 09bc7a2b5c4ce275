// SPDX-License-Identifier: GPL-3.0-only

//! BTRFS subvolume lifecycle and change tracking
//!
//! This library talks to the kernel through the BTRFS ioctl control channel:
//! it creates, snapshots and deletes subvolumes, enumerates them through
//! paginated tree searches, and reports file extents written since a given
//! generation. Commands go through the [`Btrfs`] façade, which validates
//! parameters and dispatches to the backend registered for the chosen API.

// Lets `#[derive(Record)]` expansions name `::btrfs_subvol` from inside this crate.
extern crate self as btrfs_subvol;

pub mod backend;
pub mod changes;
pub mod channel;
pub mod command;
pub mod config;
pub mod decode;
pub mod enumerate;
pub mod error;
pub mod generation;
pub mod ioctl;
pub mod records;
pub mod search;
pub mod validators;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use changes::find_updated;
pub use command::{ApiKind, Btrfs, OperationKind};
pub use config::{BtrfsConfig, SearchConfig};
pub use enumerate::{ListQuery, list_subvolumes};
pub use error::{BtrfsError, CommandError, Result, ValidationError};
pub use generation::{RootGeneration, resolve_root_generation};

// Re-export shared models
pub use btrfs_subvol_types::*;
