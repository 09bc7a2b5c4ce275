// SPDX-License-Identifier: GPL-3.0-only

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use btrfs_subvol_types::{ListOrder, SubvolumeInfo};

use super::{Btrfs, OperationKind};
use crate::enumerate::ListQuery;
use crate::error::{CommandError, Result, ValidationError};
use crate::validators::ensure_present;

/// Raw list options as given by the caller; parsed during validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRequest {
    /// Any path inside the subvolume whose subtree is listed
    pub path: PathBuf,
    /// `N`, `+N` or `-N` on the generation
    pub filter_generation: Option<String>,
    /// `N`, `+N` or `-N` on the origin generation
    pub filter_origin_generation: Option<String>,
    /// Comma-separated `[+|-]gen|ogen|rootid|path` keys
    pub sort: Option<String>,
}

fn parse_option<T>(option: &'static str, value: Option<&String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .map(|value| {
            value.parse::<T>().map_err(|e| {
                ValidationError::InvalidOption {
                    option,
                    value: value.clone(),
                    reason: e.to_string(),
                }
                .into()
            })
        })
        .transpose()
}

impl ListRequest {
    pub fn query(&self) -> Result<ListQuery> {
        Ok(ListQuery {
            generation: parse_option("generation filter", self.filter_generation.as_ref())?,
            origin_generation: parse_option(
                "origin generation filter",
                self.filter_origin_generation.as_ref(),
            )?,
            order: parse_option::<ListOrder>("sort order", self.sort.as_ref())?.unwrap_or_default(),
        })
    }

    fn validate(&self) -> Result<ListQuery> {
        if self.path.as_os_str().is_empty() {
            return Err(ValidationError::Missing("Path").into());
        }
        let query = self.query()?;
        ensure_present(&self.path)?;
        Ok(query)
    }
}

impl fmt::Display for ListRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "path='{}', gen='{}', ogen='{}', sort='{}'",
            self.path.display(),
            self.filter_generation.as_deref().unwrap_or_default(),
            self.filter_origin_generation.as_deref().unwrap_or_default(),
            self.sort.as_deref().unwrap_or_default()
        )
    }
}

pub struct List<'a> {
    btrfs: &'a Btrfs,
    request: ListRequest,
}

impl<'a> List<'a> {
    pub(super) fn new(btrfs: &'a Btrfs) -> Self {
        Self {
            btrfs,
            request: ListRequest::default(),
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.request.path = path.into();
        self
    }

    pub fn filter_generation(mut self, filter: impl Into<String>) -> Self {
        self.request.filter_generation = Some(filter.into());
        self
    }

    pub fn filter_origin_generation(mut self, filter: impl Into<String>) -> Self {
        self.request.filter_origin_generation = Some(filter.into());
        self
    }

    pub fn sort(mut self, order: impl Into<String>) -> Self {
        self.request.sort = Some(order.into());
        self
    }

    pub fn request(&self) -> &ListRequest {
        &self.request
    }

    pub fn execute(self) -> std::result::Result<Vec<SubvolumeInfo>, CommandError> {
        let request = &self.request;
        self.btrfs.execute(
            OperationKind::List,
            request,
            ListRequest::validate,
            |backend, query| backend.list(request, &query),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btrfs_subvol_types::{GenerationFilter, SortKey};
    use crate::command::ApiKind;
    use crate::testing::recording_btrfs;

    #[test]
    fn options_parse_into_a_query() {
        let request = ListRequest {
            path: PathBuf::from("/mnt"),
            filter_generation: Some("+10".to_string()),
            filter_origin_generation: None,
            sort: Some("-ogen,path".to_string()),
        };
        let query = request.query().expect("query");
        assert_eq!(query.generation, Some(GenerationFilter::AtLeast(10)));
        assert_eq!(query.origin_generation, None);
        assert_eq!(query.order.fields[0].key, SortKey::OriginGeneration);
        assert!(query.order.fields[0].descending);
    }

    #[test]
    fn malformed_options_fail_before_dispatch() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (btrfs, backend) = recording_btrfs(ApiKind::Ioctl);

        let err = btrfs
            .subvolume()
            .list()
            .path(dir.path())
            .sort("size")
            .execute()
            .expect_err("bad sort");
        assert!(err.is_validation());
        assert!(err.to_string().contains("invalid sort order 'size'"));

        let err = btrfs
            .subvolume()
            .list()
            .path(dir.path())
            .filter_generation("+x")
            .execute()
            .expect_err("bad filter");
        assert!(err.is_validation());
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn valid_request_dispatches_with_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (btrfs, backend) = recording_btrfs(ApiKind::Ioctl);

        let list = btrfs
            .subvolume()
            .list()
            .path(dir.path())
            .execute()
            .expect("list");
        assert!(list.is_empty());
        assert_eq!(backend.calls().len(), 1);
        assert!(backend.calls()[0].starts_with("list path="));
    }
}
