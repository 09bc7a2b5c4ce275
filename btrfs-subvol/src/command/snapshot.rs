// SPDX-License-Identifier: GPL-3.0-only

use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;

use super::{Btrfs, OperationKind, render_qgroups};
use crate::error::{CommandError, Result, ValidationError};
use crate::validators::{
    ensure_absent, ensure_present, require_subvolume, validate_subvolume_name,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotRequest {
    /// Subvolume to snapshot
    pub source: PathBuf,
    /// Directory the snapshot is created in
    pub destination: PathBuf,
    /// Entry name of the snapshot; defaults to the source's base name
    pub name: Option<OsString>,
    /// Accepted for compatibility; quota groups are not assigned
    pub qgroups: Vec<String>,
    pub read_only: bool,
}

impl SnapshotRequest {
    pub fn target_name(&self) -> std::result::Result<OsString, ValidationError> {
        let name = match &self.name {
            Some(name) => name.clone(),
            None => self
                .source
                .file_name()
                .map(|name| name.to_os_string())
                .ok_or_else(|| ValidationError::InvalidName(self.source.display().to_string()))?,
        };
        validate_subvolume_name(&name)?;
        Ok(name)
    }

    fn validate(&self) -> Result<()> {
        if self.source.as_os_str().is_empty() {
            return Err(ValidationError::Missing("Source").into());
        }
        if self.destination.as_os_str().is_empty() {
            return Err(ValidationError::Missing("Destination").into());
        }
        let name = self.target_name()?;
        require_subvolume(&self.source)?;
        ensure_present(&self.destination)?;
        ensure_absent(self.destination.join(name))?;
        Ok(())
    }
}

impl fmt::Display for SnapshotRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "qgroups={}, readonly={}, src='{}', dest='{}', name='{}'",
            render_qgroups(&self.qgroups),
            self.read_only,
            self.source.display(),
            self.destination.display(),
            self.name
                .as_deref()
                .map(|name| name.to_string_lossy())
                .unwrap_or_default()
        )
    }
}

pub struct Snapshot<'a> {
    btrfs: &'a Btrfs,
    request: SnapshotRequest,
}

impl<'a> Snapshot<'a> {
    pub(super) fn new(btrfs: &'a Btrfs) -> Self {
        Self {
            btrfs,
            request: SnapshotRequest::default(),
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

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.request.read_only = read_only;
        self
    }

    pub fn source(mut self, source: impl Into<PathBuf>) -> Self {
        self.request.source = source.into();
        self
    }

    pub fn destination(mut self, destination: impl Into<PathBuf>) -> Self {
        self.request.destination = destination.into();
        self
    }

    pub fn name(mut self, name: impl Into<OsString>) -> Self {
        self.request.name = Some(name.into());
        self
    }

    pub fn request(&self) -> &SnapshotRequest {
        &self.request
    }

    pub fn execute(self) -> std::result::Result<(), CommandError> {
        let request = &self.request;
        self.btrfs.execute(
            OperationKind::Snapshot,
            request,
            SnapshotRequest::validate,
            |backend, ()| backend.snapshot(request),
        )
    }
}
