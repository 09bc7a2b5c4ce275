// SPDX-License-Identifier: GPL-3.0-only

//! Backends executing validated subvolume requests, and the registry the
//! command façade dispatches through

mod cli;
mod ioctl;

use std::collections::HashMap;
use std::sync::Arc;

use btrfs_subvol_types::{ExtentChange, SubvolumeInfo};

pub use cli::CliBackend;
pub use ioctl::IoctlBackend;

use crate::command::{
    ApiKind, CreateRequest, DeleteRequest, FindNewRequest, ListRequest, OperationKind,
    SnapshotRequest,
};
use crate::config::BtrfsConfig;
use crate::enumerate::ListQuery;
use crate::error::{BtrfsError, Result};

fn unsupported(api: ApiKind, operation: OperationKind) -> BtrfsError {
    BtrfsError::UnsupportedOperation {
        api: api.to_string(),
        operation: operation.to_string(),
    }
}

/// One way of carrying out subvolume operations
///
/// Requests arrive already validated. Operations a backend does not provide
/// fail with [`BtrfsError::UnsupportedOperation`].
pub trait SubvolumeBackend: Send + Sync {
    fn api(&self) -> ApiKind;

    fn create(&self, _request: &CreateRequest) -> Result<()> {
        Err(unsupported(self.api(), OperationKind::Create))
    }

    fn snapshot(&self, _request: &SnapshotRequest) -> Result<()> {
        Err(unsupported(self.api(), OperationKind::Snapshot))
    }

    fn delete(&self, _request: &DeleteRequest) -> Result<()> {
        Err(unsupported(self.api(), OperationKind::Delete))
    }

    /// Returns the generation watermark for the next incremental scan.
    fn find_new(
        &self,
        _request: &FindNewRequest,
        _on_change: &mut dyn FnMut(ExtentChange),
    ) -> Result<u64> {
        Err(unsupported(self.api(), OperationKind::FindNew))
    }

    fn list(&self, _request: &ListRequest, _query: &ListQuery) -> Result<Vec<SubvolumeInfo>> {
        Err(unsupported(self.api(), OperationKind::List))
    }
}

/// Immutable map from (API, operation) to the backend serving it
pub struct BackendRegistry {
    routes: HashMap<(ApiKind, OperationKind), Arc<dyn SubvolumeBackend>>,
}

impl BackendRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder {
            routes: HashMap::new(),
        }
    }

    /// Every operation over ioctls; only create is routed to the CLI backend.
    pub fn with_defaults(config: &BtrfsConfig) -> Self {
        Self::builder()
            .register_all(ApiKind::Ioctl, Arc::new(IoctlBackend::new(config.search)))
            .register(ApiKind::Cli, OperationKind::Create, Arc::new(CliBackend))
            .build()
    }

    pub fn backend_for(
        &self,
        api: ApiKind,
        operation: OperationKind,
    ) -> Result<Arc<dyn SubvolumeBackend>> {
        tracing::debug!("Resolving {} backend for '{}'", api, operation);
        self.routes
            .get(&(api, operation))
            .cloned()
            .ok_or_else(|| unsupported(api, operation))
    }

    pub fn supports(&self, api: ApiKind, operation: OperationKind) -> bool {
        self.routes.contains_key(&(api, operation))
    }
}

pub struct RegistryBuilder {
    routes: HashMap<(ApiKind, OperationKind), Arc<dyn SubvolumeBackend>>,
}

impl RegistryBuilder {
    /// Route one operation; a later registration for the same pair wins.
    pub fn register(
        mut self,
        api: ApiKind,
        operation: OperationKind,
        backend: Arc<dyn SubvolumeBackend>,
    ) -> Self {
        self.routes.insert((api, operation), backend);
        self
    }

    pub fn register_all(mut self, api: ApiKind, backend: Arc<dyn SubvolumeBackend>) -> Self {
        for operation in OperationKind::ALL {
            self.routes.insert((api, operation), backend.clone());
        }
        self
    }

    pub fn build(self) -> BackendRegistry {
        BackendRegistry {
            routes: self.routes,
        }
    }
}
