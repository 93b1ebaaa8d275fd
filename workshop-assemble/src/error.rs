//! Error types for workshop-assemble.

use std::path::PathBuf;

use thiserror::Error;

use workshop_core::{ConfigError, DocumentError, LayoutError, RecipeError, SourceError};

/// All errors that can arise while building artifacts.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The section declares something unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A source reference could not be resolved.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// `output_format` is outside the known set; nothing is built.
    #[error("unknown output_format '{format}'")]
    UnknownFormat { format: String },

    /// Every source resolved to nothing.
    #[error("assembled content for '{artifact}' is empty")]
    EmptyContent { artifact: String },

    /// Format-specific validation rejected the artifact.
    #[error("'{artifact}' failed validation: {}", violations.join("; "))]
    Validation {
        artifact: String,
        violations: Vec<String>,
    },

    /// A recipe could not be read or parsed.
    #[error(transparent)]
    Recipe(#[from] RecipeError),

    /// Workshop directories are missing.
    #[error(transparent)]
    Layout(#[from] LayoutError),

    /// Rendering a metadata header failed.
    #[error("failed to render document: {0}")]
    Document(#[from] DocumentError),

    /// Hook document serialization failed.
    #[error("hook JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub(crate) fn from_config(err: ConfigError) -> Self {
        match err {
            ConfigError::UnknownFormat { format } => BuildError::UnknownFormat { format },
            other => BuildError::Config(other),
        }
    }
}

/// Convenience constructor for [`BuildError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> BuildError {
    BuildError::Io {
        path: path.into(),
        source,
    }
}
