// SPDX-License-Identifier: GPL-3.0-only

use std::path::PathBuf;

use thiserror::Error;

use crate::decode::DecodeError;

/// Failures of the name and path checks run before any ioctl is issued
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("incorrect subvolume name '{0}'")]
    InvalidName(String),

    #[error("subvolume name too long '{name}', max length is {max}")]
    NameTooLong { name: String, max: usize },

    #[error("'{}' exists", .0.display())]
    Exists(PathBuf),

    #[error("'{}' not found", .0.display())]
    NotFound(PathBuf),

    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid {option} '{value}': {reason}")]
    InvalidOption {
        option: &'static str,
        value: String,
        reason: String,
    },

    #[error("cannot access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Error types for BTRFS control-channel operations
#[derive(Error, Debug)]
pub enum BtrfsError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("'{}' is not a subvolume", .0.display())]
    NotASubvolume(PathBuf),

    #[error("failed to open '{}': {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{request} failed: {source}")]
    Query {
        request: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("operation '{operation}' is not supported by the {api} backend")]
    UnsupportedOperation { api: String, operation: String },

    #[error("Unimplemented: '{operation}' on the {api} backend")]
    Unimplemented { api: String, operation: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BtrfsError {
    pub(crate) fn query(request: &'static str) -> impl FnOnce(std::io::Error) -> Self {
        move |source| BtrfsError::Query { request, source }
    }
}

/// Result type alias for BTRFS operations
pub type Result<T> = std::result::Result<T, BtrfsError>;

/// A failed command, carrying the operation name and a rendering of every
/// builder parameter it was executed with
#[derive(Error, Debug)]
#[error("ERROR {operation}: {source}, args=({context})")]
pub struct CommandError {
    pub operation: String,
    pub context: String,
    #[source]
    pub source: BtrfsError,
}

impl CommandError {
    pub fn cause(&self) -> &BtrfsError {
        &self.source
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.source, BtrfsError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_renders_operation_cause_and_args() {
        let error = CommandError {
            operation: "subvolume create".to_string(),
            context: "qgroups=[], dest='/mnt/repo'".to_string(),
            source: ValidationError::Exists(PathBuf::from("/mnt/repo")).into(),
        };

        assert_eq!(
            error.to_string(),
            "ERROR subvolume create: '/mnt/repo' exists, args=(qgroups=[], dest='/mnt/repo')"
        );
        assert!(error.is_validation());
    }

    #[test]
    fn query_error_names_the_request() {
        let error = BtrfsError::query("TREE_SEARCH")(std::io::Error::from_raw_os_error(libc::EPERM));
        assert!(error.to_string().starts_with("TREE_SEARCH failed: "));
    }
}
