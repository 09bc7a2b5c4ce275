// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::path::PathBuf;

use super::{Btrfs, OperationKind};
use crate::error::{CommandError, Result, ValidationError};
use crate::validators::{require_subvolume, split_destination};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteRequest {
    pub destination: PathBuf,
    /// Also destroy subvolumes nested below the destination
    pub recursive: bool,
}

impl DeleteRequest {
    fn validate(&self) -> Result<()> {
        if self.destination.as_os_str().is_empty() {
            return Err(ValidationError::Missing("Subvolume").into());
        }
        split_destination(&self.destination)?;
        require_subvolume(&self.destination)
    }
}

impl fmt::Display for DeleteRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dest='{}', recursive={}",
            self.destination.display(),
            self.recursive
        )
    }
}

pub struct Delete<'a> {
    btrfs: &'a Btrfs,
    request: DeleteRequest,
}

impl<'a> Delete<'a> {
    pub(super) fn new(btrfs: &'a Btrfs) -> Self {
        Self {
            btrfs,
            request: DeleteRequest::default(),
        }
    }

    pub fn destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.request.destination = destination.into();
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.request.recursive = recursive;
        self
    }

    pub fn request(&self) -> &DeleteRequest {
        &self.request
    }

    pub fn execute(self) -> std::result::Result<(), CommandError> {
        let request = &self.request;
        self.btrfs.execute(
            OperationKind::Delete,
            request,
            DeleteRequest::validate,
            |backend, ()| backend.delete(request),
        )
    }
}
