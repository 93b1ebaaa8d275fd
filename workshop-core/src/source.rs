//! Source resolution: turning recipe source references into text.
//!
//! A source file may carry named slices:
//!
//! ```text
//! <!-- slice:intro -->
//! Intro text.
//! <!-- /slice -->
//! <!-- slice:rules -->
//! Rules run to the next marker or end of file.
//! ```
//!
//! A slice ends at whichever comes first of the explicit end marker or the
//! next slice's start marker, so a slice never swallows its neighbour.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, SourceError};
use crate::value::ConfigValue;

/// Prefix shared by every slice start marker.
pub const SLICE_START_PREFIX: &str = "<!-- slice:";
/// Explicit slice end marker.
pub const SLICE_END: &str = "<!-- /slice -->";
/// Prefix stripped from source paths authored against the parent directory.
const CONTEXT_PREFIX: &str = ".context/";

/// Start marker for `slice_id`.
pub fn slice_marker(slice_id: &str) -> String {
    format!("{SLICE_START_PREFIX}{slice_id} -->")
}

/// Extract slice `slice_id` from already-loaded text. `None` if the marker is absent.
pub fn slice_from_str(content: &str, slice_id: &str) -> Option<String> {
    let marker = slice_marker(slice_id);
    let start = content.find(&marker)? + marker.len();
    let rest = &content[start..];

    let end = [rest.find(SLICE_END), rest.find(SLICE_START_PREFIX)]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(rest.len());

    Some(rest[..end].trim().to_owned())
}

/// Extract slice `slice_id` from `file`.
pub fn extract_slice(file: &Path, slice_id: &str) -> Result<String, SourceError> {
    let content = read_text(file)?;
    slice_from_str(&content, slice_id).ok_or_else(|| SourceError::SliceNotFound {
        slice_id: slice_id.to_owned(),
        path: file.to_path_buf(),
    })
}

/// Whole-file inclusion, trimmed.
pub fn include_file(file: &Path) -> Result<String, SourceError> {
    Ok(read_text(file)?.trim().to_owned())
}

fn read_text(file: &Path) -> Result<String, SourceError> {
    std::fs::read_to_string(file).map_err(|e| source_err(file, e))
}

fn source_err(file: &Path, err: std::io::Error) -> SourceError {
    if err.kind() == ErrorKind::NotFound {
        SourceError::FileMissing {
            path: file.to_path_buf(),
        }
    } else {
        SourceError::Read {
            path: file.to_path_buf(),
            source: err,
        }
    }
}

// ---------------------------------------------------------------------------
// SourceRef
// ---------------------------------------------------------------------------

/// One declared source, in one of the accepted shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// `{slice: id, slice-file: path}` (or the older `{slice: id, file: path}`).
    Slice { slice_id: String, file: String },
    /// `{file: path}`: the whole file.
    File { file: String },
    /// `{inline: text}`: literal text.
    Inline { text: String },
}

impl SourceRef {
    /// Classify a declared source item. Any other shape is a [`ConfigError`].
    pub fn from_value(value: &ConfigValue) -> Result<Self, ConfigError> {
        let Some(map) = value.as_mapping() else {
            return Err(ConfigError::InvalidSource {
                detail: format!("expected a mapping, found {}", value.kind()),
            });
        };

        if let Some(text) = map.get("inline").and_then(ConfigValue::as_str) {
            return Ok(SourceRef::Inline {
                text: text.to_owned(),
            });
        }

        let slice_id = map.get_scalar("slice");
        let slice_file = ["slice-file", "slice_file"]
            .iter()
            .find_map(|k| map.get_scalar(k));
        let file = map.get_scalar("file");

        match (slice_id, slice_file, file) {
            (Some(slice_id), Some(file), _) | (Some(slice_id), None, Some(file)) => {
                Ok(SourceRef::Slice { slice_id, file })
            }
            (None, None, Some(file)) => Ok(SourceRef::File { file }),
            (Some(slice_id), None, None) => Err(ConfigError::InvalidSource {
                detail: format!("slice '{slice_id}' has no slice-file"),
            }),
            _ => Err(ConfigError::InvalidSource {
                detail: format!(
                    "expected slice + slice-file, file, or inline; found keys [{}]",
                    map.keys().collect::<Vec<_>>().join(", ")
                ),
            }),
        }
    }

    /// Output name derived from the reference when none is declared.
    pub fn derived_name(&self) -> Option<String> {
        match self {
            SourceRef::Slice { slice_id, .. } => Some(format!("{slice_id}.md")),
            SourceRef::File { file } => Path::new(file)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned()),
            SourceRef::Inline { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// SourceResolver
// ---------------------------------------------------------------------------

/// Resolves [`SourceRef`]s against the context root.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    base: PathBuf,
}

impl SourceResolver {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Absolute path for a declared source path.
    pub fn resolve_path(&self, declared: &str) -> PathBuf {
        let normalized = declared.replace('\\', "/");
        let relative = normalized
            .strip_prefix(CONTEXT_PREFIX)
            .unwrap_or(&normalized);
        self.base.join(relative)
    }

    /// Resolve a reference to trimmed text.
    pub fn text(&self, source: &SourceRef) -> Result<String, SourceError> {
        match source {
            SourceRef::Slice { slice_id, file } => extract_slice(&self.resolve_path(file), slice_id),
            SourceRef::File { file } => include_file(&self.resolve_path(file)),
            SourceRef::Inline { text } => Ok(text.trim().to_owned()),
        }
    }

    /// Resolve a reference to raw bytes. Whole files are returned untouched
    /// (binary assets survive); slices and inline text are UTF-8.
    pub fn bytes(&self, source: &SourceRef) -> Result<Vec<u8>, SourceError> {
        match source {
            SourceRef::File { file } => {
                let path = self.resolve_path(file);
                std::fs::read(&path).map_err(|e| source_err(&path, e))
            }
            SourceRef::Slice { .. } | SourceRef::Inline { .. } => {
                self.text(source).map(String::into_bytes)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
