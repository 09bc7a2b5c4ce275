// SPDX-License-Identifier: GPL-3.0-only

//! Generation filters and sort order for subvolume listing
//!
//! The syntax follows `btrfs subvolume list`: a filter is `N`, `+N` or `-N`,
//! and a sort order is a comma-separated list of `gen`, `ogen`, `rootid` and
//! `path`, each optionally prefixed with `+` (ascending) or `-` (descending).

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::SubvolumeInfo;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseListOptionError {
    #[error("invalid generation filter '{0}', expected N, +N or -N")]
    InvalidFilter(String),

    #[error("unknown sort key '{0}', expected gen, ogen, rootid or path")]
    UnknownSortKey(String),

    #[error("empty sort order")]
    EmptySort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "value")]
pub enum GenerationFilter {
    Equal(u64),
    AtLeast(u64),
    AtMost(u64),
}

impl GenerationFilter {
    pub fn matches(&self, value: u64) -> bool {
        match *self {
            GenerationFilter::Equal(n) => value == n,
            GenerationFilter::AtLeast(n) => value >= n,
            GenerationFilter::AtMost(n) => value <= n,
        }
    }
}

impl fmt::Display for GenerationFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationFilter::Equal(n) => write!(f, "{n}"),
            GenerationFilter::AtLeast(n) => write!(f, "+{n}"),
            GenerationFilter::AtMost(n) => write!(f, "-{n}"),
        }
    }
}

impl FromStr for GenerationFilter {
    type Err = ParseListOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseListOptionError::InvalidFilter(s.to_string());
        let (ctor, digits): (fn(u64) -> Self, &str) = match s.as_bytes().first() {
            Some(b'+') => (GenerationFilter::AtLeast, &s[1..]),
            Some(b'-') => (GenerationFilter::AtMost, &s[1..]),
            _ => (GenerationFilter::Equal, s),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        digits.parse::<u64>().map(ctor).map_err(|_| invalid())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Generation,
    OriginGeneration,
    RootId,
    Path,
}

impl SortKey {
    fn compare(self, a: &SubvolumeInfo, b: &SubvolumeInfo) -> Ordering {
        match self {
            SortKey::Generation => a.generation.cmp(&b.generation),
            SortKey::OriginGeneration => a.origin_generation.cmp(&b.origin_generation),
            SortKey::RootId => a.id.cmp(&b.id),
            SortKey::Path => a.path.cmp(&b.path),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortKey::Generation => write!(f, "gen"),
            SortKey::OriginGeneration => write!(f, "ogen"),
            SortKey::RootId => write!(f, "rootid"),
            SortKey::Path => write!(f, "path"),
        }
    }
}

impl FromStr for SortKey {
    type Err = ParseListOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gen" => Ok(SortKey::Generation),
            "ogen" => Ok(SortKey::OriginGeneration),
            "rootid" => Ok(SortKey::RootId),
            "path" => Ok(SortKey::Path),
            _ => Err(ParseListOptionError::UnknownSortKey(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortField {
    pub key: SortKey,
    pub descending: bool,
}

/// Ordered list of sort keys; earlier keys take precedence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListOrder {
    pub fields: Vec<SortField>,
}

impl Default for ListOrder {
    fn default() -> Self {
        ListOrder {
            fields: vec![SortField {
                key: SortKey::RootId,
                descending: false,
            }],
        }
    }
}

impl ListOrder {
    pub fn compare(&self, a: &SubvolumeInfo, b: &SubvolumeInfo) -> Ordering {
        self.fields
            .iter()
            .map(|field| {
                let ordering = field.key.compare(a, b);
                if field.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }

    pub fn sort(&self, subvolumes: &mut [SubvolumeInfo]) {
        subvolumes.sort_by(|a, b| self.compare(a, b));
    }
}

impl fmt::Display for ListOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, field) in self.fields.iter().enumerate() {
            if index > 0 {
                write!(f, ",")?;
            }
            let sign = if field.descending { "-" } else { "+" };
            write!(f, "{sign}{}", field.key)?;
        }
        Ok(())
    }
}

impl FromStr for ListOrder {
    type Err = ParseListOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut fields = Vec::new();
        for part in s.split(',').map(str::trim).filter(|part| !part.is_empty()) {
            let (descending, name) = match part.as_bytes()[0] {
                b'-' => (true, &part[1..]),
                b'+' => (false, &part[1..]),
                _ => (false, part),
            };
            fields.push(SortField {
                key: name.parse()?,
                descending,
            });
        }
        if fields.is_empty() {
            return Err(ParseListOptionError::EmptySort);
        }
        Ok(ListOrder { fields })
    }
}
