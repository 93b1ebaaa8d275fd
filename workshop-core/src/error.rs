//! Error types for workshop-core.

use std::path::PathBuf;

use thiserror::Error;

/// A recipe section declared something the engine cannot use.
///
/// Always recovered at the smallest enclosing unit (source item, section,
/// or recipe) by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A key the operation needs is absent.
    #[error("missing required key '{key}'")]
    Missing { key: String },

    /// A key is present but holds the wrong shape of value.
    #[error("key '{key}' must be {expected}, found {found}")]
    WrongType {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// `output_format` names a format the builder does not know.
    #[error("unknown output_format '{format}'")]
    UnknownFormat { format: String },

    /// A source reference has none of the accepted shapes.
    #[error("invalid source reference: {detail}")]
    InvalidSource { detail: String },

    /// A per-item declaration (output name, target, ...) is unusable.
    #[error("invalid item: {detail}")]
    InvalidItem { detail: String },
}

/// A source reference could not be resolved to text or bytes.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The start marker for `slice_id` does not occur in the file.
    #[error("slice '{slice_id}' not found in {path}")]
    SliceNotFound { slice_id: String, path: PathBuf },

    /// The referenced file does not exist.
    #[error("source file not found: {path}")]
    FileMissing { path: PathBuf },

    /// The file exists but could not be read (or is not valid UTF-8 text).
    #[error("failed to read source {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure to split or re-serialize a structured text document.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// The opening `---` line has no matching closing line.
    #[error("metadata header is not closed")]
    UnclosedHeader,

    /// The header block is not valid YAML.
    #[error("metadata header is not valid YAML: {0}")]
    Header(#[source] serde_yaml::Error),

    /// The header parsed, but to something other than a mapping.
    #[error("metadata header must be a mapping, found {found}")]
    HeaderNotMapping { found: &'static str },

    /// Serializing the header back to YAML failed.
    #[error("failed to serialize metadata header: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

/// All errors that can arise while loading a recipe document.
#[derive(Debug, Error)]
pub enum RecipeError {
    /// Underlying I/O failure reading the recipe.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The recipe's metadata header is malformed.
    #[error("malformed recipe {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },

    /// The body holds no fenced configuration block.
    #[error("no configuration block in {path}")]
    NoConfigurationBlock { path: PathBuf },

    /// The configuration block holds zero mapping documents.
    #[error("configuration block in {path} holds no mapping documents")]
    EmptyConfiguration { path: PathBuf },

    /// The configuration block is not valid YAML.
    #[error("failed to parse configuration in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Errors from reading or writing the deployment manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Underlying I/O failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The persisted manifest could not be parsed.
    #[error("manifest at {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },

    /// Rendering the manifest back to text failed.
    #[error("failed to render manifest: {0}")]
    Render(#[source] DocumentError),
}

/// Errors locating the workshop directories or the home directory.
#[derive(Debug, Error)]
pub enum LayoutError {
    /// The recipe directory under the context root is absent.
    #[error("workshop directory not found at {path}")]
    WorkshopMissing { path: PathBuf },

    /// The staging area has not been created by an assembly run yet.
    #[error("output directory not found at {path}")]
    OutputMissing { path: PathBuf },

    /// Listing the recipe directory failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}
