//! Error types for ota-sync.
//!
//! Failures split along the STAGING / COMMITTING boundary: everything except
//! [`SyncError::PartialTree`] leaves the live tree untouched and is safe to
//! retry from a fresh check.

use std::path::PathBuf;

use thiserror::Error;

use ota_core::{ConfigError, RelativePath};

/// All errors that can arise from check and apply operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Non-200 status or connection failure on the tree listing or a raw fetch.
    #[error("transport failure for {url}: {reason}")]
    Transport { url: String, reason: String },

    /// Fetched bytes did not match the hash recorded by the check.
    #[error("verification failed for {path}: expected {expected}, got {actual}")]
    Verification {
        path: RelativePath,
        expected: String,
        actual: String,
    },

    /// A local file changed between check and apply.
    #[error("local file {path} changed since the last check; re-run the check")]
    LocalDrift { path: RelativePath },

    /// A live-tree mutation failed after earlier mutations of the same commit
    /// already succeeded. The tree is inconsistent; no rollback is attempted.
    #[error(
        "commit interrupted during {step} at {path} after {completed} change(s); \
         the local tree is partially updated: {source}"
    )]
    PartialTree {
        step: CommitStep,
        path: PathBuf,
        completed: usize,
        #[source]
        source: std::io::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The tree listing was valid JSON but not the expected shape.
    #[error("unexpected tree listing format: {0}")]
    TreeFormat(String),

    /// JSON deserialization error (tree listing).
    #[error("tree listing JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration, detected before any network call.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Whether a retry of the same request can plausibly succeed.
    ///
    /// Only transport failures qualify; filesystem, format and verification
    /// errors are never retried by [`crate::retry::with_retry`].
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncError::Transport { .. })
    }
}

/// The four ordered steps of the COMMITTING phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStep {
    CreateDirs,
    DeleteFiles,
    DeleteDirs,
    MoveFiles,
}

impl std::fmt::Display for CommitStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitStep::CreateDirs => write!(f, "directory creation"),
            CommitStep::DeleteFiles => write!(f, "file deletion"),
            CommitStep::DeleteDirs => write!(f, "directory deletion"),
            CommitStep::MoveFiles => write!(f, "staged file move"),
        }
    }
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Transport`].
pub(crate) fn transport_err(url: &str, reason: impl ToString) -> SyncError {
    SyncError::Transport {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
