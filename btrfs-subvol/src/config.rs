// SPDX-License-Identifier: GPL-3.0-only

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::command::ApiKind;
use crate::error::{BtrfsError, Result};
use crate::search::DEFAULT_ITEMS_PER_PAGE;

/// Tuning for tree searches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Items requested per TREE_SEARCH call; 0 is treated as 1 by the
    /// search engine and rejected when read from a file
    pub items_per_page: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            items_per_page: DEFAULT_ITEMS_PER_PAGE,
        }
    }
}

/// Library configuration, usually read from a TOML file
///
/// ```toml
/// api = "ioctl"
///
/// [search]
/// items_per_page = 4096
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BtrfsConfig {
    pub api: ApiKind,
    pub search: SearchConfig,
}

impl BtrfsConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BtrfsError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: BtrfsConfig =
            toml::from_str(text).map_err(|e| BtrfsError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.search.items_per_page == 0 {
            return Err(BtrfsError::Config(
                "search.items_per_page must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
