// SPDX-License-Identifier: GPL-3.0-only

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use super::{Btrfs, OperationKind, render_qgroups};
use crate::error::{CommandError, Result, ValidationError};
use crate::validators::{ensure_absent, split_destination};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateRequest {
    /// Full path of the subvolume to create
    pub destination: PathBuf,
    /// Accepted for compatibility; quota groups are not assigned
    pub qgroups: Vec<String>,
}

impl CreateRequest {
    /// Directory to create the subvolume in, and its name there.
    pub fn target(&self) -> std::result::Result<(PathBuf, OsString), ValidationError> {
        split_destination(&self.destination)
    }

    fn validate(&self) -> Result<()> {
        if self.destination.as_os_str().is_empty() {
            return Err(ValidationError::Missing("Subvolume").into());
        }
        self.target()?;
        ensure_absent(&self.destination)?;
        Ok(())
    }
}

impl fmt::Display for CreateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "qgroups={}, dest='{}'",
            render_qgroups(&self.qgroups),
            self.destination.display()
        )
    }
}

pub struct Create<'a> {
    btrfs: &'a Btrfs,
    request: CreateRequest,
}

impl<'a> Create<'a> {
    pub(super) fn new(btrfs: &'a Btrfs) -> Self {
        Self {
            btrfs,
            request: CreateRequest::default(),
        }
    }

    pub fn quota_groups<I, S>(mut self, qgroups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.qgroups.extend(qgroups.into_iter().map(Into::into));
        self
    }

    pub fn destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.request.destination = destination.into();
        self
    }

    pub fn request(&self) -> &CreateRequest {
        &self.request
    }

    pub fn execute(self) -> std::result::Result<(), CommandError> {
        let request = &self.request;
        self.btrfs.execute(
            OperationKind::Create,
            request,
            CreateRequest::validate,
            |backend, ()| backend.create(request),
        )
    }
}
