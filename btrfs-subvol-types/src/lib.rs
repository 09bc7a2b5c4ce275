// SPDX-License-Identifier: GPL-3.0-only

//! Data models returned by the btrfs subvolume library
//!
//! These types cross the library boundary: the enumerator fills
//! [`SubvolumeInfo`], the change detector emits [`ExtentChange`], and the list
//! options ([`GenerationFilter`], [`ListOrder`]) are parsed here so the CLI and
//! the library agree on their syntax.

pub mod list;
pub mod subvolume;

pub use list::{GenerationFilter, ListOrder, ParseListOptionError, SortField, SortKey};
pub use subvolume::{ExtentChange, FindNewReport, SubvolumeInfo};
