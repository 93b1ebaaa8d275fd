//! Error types for workshop-sync.

use std::path::PathBuf;

use thiserror::Error;

use workshop_core::{LayoutError, ManifestError};

/// All errors that can arise from sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The workshop or staging directory is missing.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// The manifest could not be written back.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// A target exists with the other kind (a file where a directory belongs
    /// or vice versa).
    #[error("{path} exists but is not a {expected}")]
    WrongKind {
        path: PathBuf,
        expected: &'static str,
    },

    /// Walking a bundle directory failed.
    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization error (power registry).
    #[error("registry JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn walk_err(path: impl Into<PathBuf>, source: walkdir::Error) -> SyncError {
    SyncError::Walk {
        path: path.into(),
        source,
    }
}
