// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::path::PathBuf;

use btrfs_subvol_types::{ExtentChange, FindNewReport};

use super::{Btrfs, OperationKind};
use crate::error::{CommandError, Result, ValidationError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindNewRequest {
    /// Subvolume to scan
    pub destination: PathBuf,
    /// Report extents written at or after this generation
    pub last_gen: u64,
}

impl FindNewRequest {
    fn validate(&self) -> Result<()> {
        if self.destination.as_os_str().is_empty() {
            return Err(ValidationError::Missing("Subvolume").into());
        }
        Ok(())
    }
}

impl fmt::Display for FindNewRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dest='{}', last_gen={}",
            self.destination.display(),
            self.last_gen
        )
    }
}

pub struct FindNew<'a> {
    btrfs: &'a Btrfs,
    request: FindNewRequest,
}

impl<'a> FindNew<'a> {
    pub(super) fn new(btrfs: &'a Btrfs) -> Self {
        Self {
            btrfs,
            request: FindNewRequest::default(),
        }
    }

    pub fn destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.request.destination = destination.into();
        self
    }

    pub fn last_gen(mut self, last_gen: u64) -> Self {
        self.request.last_gen = last_gen;
        self
    }

    pub fn request(&self) -> &FindNewRequest {
        &self.request
    }

    /// Stream every changed extent to `on_change`; returns the generation to
    /// use as `last_gen` next time.
    pub fn execute_with<F>(self, mut on_change: F) -> std::result::Result<u64, CommandError>
    where
        F: FnMut(ExtentChange),
    {
        let request = &self.request;
        self.btrfs.execute(
            OperationKind::FindNew,
            request,
            FindNewRequest::validate,
            |backend, ()| backend.find_new(request, &mut on_change),
        )
    }

    pub fn execute(self) -> std::result::Result<FindNewReport, CommandError> {
        let mut changes = Vec::new();
        let generation = self.execute_with(|change| changes.push(change))?;
        Ok(FindNewReport {
            changes,
            generation,
        })
    }
}
