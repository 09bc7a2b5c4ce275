// SPDX-License-Identifier: GPL-3.0-only

use super::SubvolumeBackend;
use crate::command::{ApiKind, CreateRequest, OperationKind};
use crate::error::{BtrfsError, Result};

/// Placeholder for driving the external `btrfs` tool
#[derive(Debug, Clone, Copy, Default)]
pub struct CliBackend;

impl SubvolumeBackend for CliBackend {
    fn api(&self) -> ApiKind {
        ApiKind::Cli
    }

    fn create(&self, _request: &CreateRequest) -> Result<()> {
        Err(BtrfsError::Unimplemented {
            api: ApiKind::Cli.to_string(),
            operation: OperationKind::Create.to_string(),
        })
    }
}
