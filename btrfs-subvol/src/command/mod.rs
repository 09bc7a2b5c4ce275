// SPDX-License-Identifier: GPL-3.0-only

//! Fluent subvolume commands
//!
//! ```rust,ignore
//! let btrfs = Btrfs::ioctl();
//! btrfs.subvolume().create().destination("/mnt/pool/repo").execute()?;
//! btrfs
//!     .subvolume()
//!     .snapshot()
//!     .source("/mnt/pool/repo")
//!     .destination("/mnt/pool/snapshots")
//!     .read_only(true)
//!     .execute()?;
//! ```
//!
//! Every builder validates its parameters before touching the filesystem,
//! then dispatches to the backend registered for the configured API and the
//! operation. Failures come back as [`CommandError`] carrying the operation
//! name and the rendered parameters.

mod create;
mod delete;
mod find_new;
mod list;
mod snapshot;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use create::{Create, CreateRequest};
pub use delete::{Delete, DeleteRequest};
pub use find_new::{FindNew, FindNewRequest};
pub use list::{List, ListRequest};
pub use snapshot::{Snapshot, SnapshotRequest};

use crate::backend::{BackendRegistry, SubvolumeBackend};
use crate::config::BtrfsConfig;
use crate::error::{CommandError, Result};

/// How commands reach the filesystem
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKind {
    /// Kernel ioctls on directory handles
    #[default]
    Ioctl,
    /// The external `btrfs` tool
    Cli,
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiKind::Ioctl => write!(f, "IOCTL"),
            ApiKind::Cli => write!(f, "CLI"),
        }
    }
}

impl FromStr for ApiKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ioctl" => Ok(ApiKind::Ioctl),
            "cli" => Ok(ApiKind::Cli),
            _ => Err(format!("Invalid api: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Snapshot,
    Delete,
    FindNew,
    List,
}

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::Create,
        OperationKind::Snapshot,
        OperationKind::Delete,
        OperationKind::FindNew,
        OperationKind::List,
    ];
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Create => write!(f, "subvolume create"),
            OperationKind::Snapshot => write!(f, "subvolume snapshot"),
            OperationKind::Delete => write!(f, "subvolume delete"),
            OperationKind::FindNew => write!(f, "subvolume find-new"),
            OperationKind::List => write!(f, "subvolume list"),
        }
    }
}

/// Entry point holding the API selection and the backend registry
#[derive(Clone)]
pub struct Btrfs {
    api: ApiKind,
    registry: Arc<BackendRegistry>,
}

impl Btrfs {
    pub fn new(config: &BtrfsConfig) -> Self {
        Self {
            api: config.api,
            registry: Arc::new(BackendRegistry::with_defaults(config)),
        }
    }

    pub fn with_registry(api: ApiKind, registry: Arc<BackendRegistry>) -> Self {
        Self { api, registry }
    }

    pub fn ioctl() -> Self {
        Self::new(&BtrfsConfig::default())
    }

    pub fn cli() -> Self {
        Self::new(&BtrfsConfig {
            api: ApiKind::Cli,
            ..BtrfsConfig::default()
        })
    }

    pub fn api(&self) -> ApiKind {
        self.api
    }

    pub fn subvolume(&self) -> Subvolume<'_> {
        Subvolume { btrfs: self }
    }

    /// Validate, resolve the backend, run. Every failure is wrapped with the
    /// operation and the rendered request.
    fn execute<R, V, T>(
        &self,
        operation: OperationKind,
        request: &R,
        validate: impl FnOnce(&R) -> Result<V>,
        run: impl FnOnce(&dyn SubvolumeBackend, V) -> Result<T>,
    ) -> std::result::Result<T, CommandError>
    where
        R: fmt::Display,
    {
        let outcome = validate(request).and_then(|validated| {
            let backend = self.registry.backend_for(self.api, operation)?;
            run(backend.as_ref(), validated)
        });
        outcome.map_err(|source| CommandError {
            operation: operation.to_string(),
            context: request.to_string(),
            source,
        })
    }
}

/// Subvolume command group
pub struct Subvolume<'a> {
    btrfs: &'a Btrfs,
}

impl<'a> Subvolume<'a> {
    pub fn create(&self) -> Create<'a> {
        Create::new(self.btrfs)
    }

    pub fn snapshot(&self) -> Snapshot<'a> {
        Snapshot::new(self.btrfs)
    }

    pub fn delete(&self) -> Delete<'a> {
        Delete::new(self.btrfs)
    }

    pub fn find_new(&self) -> FindNew<'a> {
        FindNew::new(self.btrfs)
    }

    pub fn list(&self) -> List<'a> {
        List::new(self.btrfs)
    }
}

/// `[a, b]` rendering of quota groups for command context
fn render_qgroups(qgroups: &[String]) -> String {
    format!("[{}]", qgroups.join(" "))
}
