//! Recipe documents and their configuration sections.
//!
//! A recipe is a structured text document whose body holds one fenced
//! ```` ```yaml ```` block. The block may contain several `---`-separated
//! documents; each mapping document becomes one [`RecipeSection`].
//!
//! The first mapping's `name` and `output_format` are inherited by every
//! section: `section = overlay(extract(first, INHERITED_KEYS), raw)`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::document::Document;
use crate::error::{ConfigError, RecipeError};
use crate::value::{ConfigMap, ConfigValue};

/// Keys copied from the first section into every section.
pub const INHERITED_KEYS: &[&str] = &["name", "output_format"];

/// Injected per-section key: number of sections in the owning document.
pub const KEY_TOTAL_SECTIONS: &str = "_total_sections";
/// Injected per-section key: suffix inserted before the extension of a
/// colliding agent filename.
pub const KEY_AGENT_DISAMBIGUATOR: &str = "_agent_disambiguator";

fn config_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```yaml\n(.*?)\n```").expect("valid config block regex"))
}

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// The closed set of artifact formats a section can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    Agent,
    Skill,
    Power,
    Command,
    Prompt,
    Hook,
}

impl OutputFormat {
    /// Command, prompt and hook share one builder.
    pub fn is_command_like(&self) -> bool {
        matches!(self, OutputFormat::Command | OutputFormat::Prompt | OutputFormat::Hook)
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "agent" => Ok(OutputFormat::Agent),
            "skill" => Ok(OutputFormat::Skill),
            "power" => Ok(OutputFormat::Power),
            "command" => Ok(OutputFormat::Command),
            "prompt" => Ok(OutputFormat::Prompt),
            "hook" => Ok(OutputFormat::Hook),
            other => Err(ConfigError::UnknownFormat {
                format: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputFormat::Agent => "agent",
            OutputFormat::Skill => "skill",
            OutputFormat::Power => "power",
            OutputFormat::Command => "command",
            OutputFormat::Prompt => "prompt",
            OutputFormat::Hook => "hook",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// RecipeSection
// ---------------------------------------------------------------------------

/// One configuration unit of a recipe.
///
/// Immutable once built: deriving keys produces a new section via
/// [`RecipeSection::with_key`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeSection {
    recipe_file: PathBuf,
    index: usize,
    config: ConfigMap,
}

impl RecipeSection {
    pub fn new(recipe_file: impl Into<PathBuf>, index: usize, config: ConfigMap) -> Self {
        Self {
            recipe_file: recipe_file.into(),
            index,
            config,
        }
    }

    pub fn recipe_file(&self) -> &Path {
        &self.recipe_file
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    /// A copy of this section with `key` set.
    pub fn with_key(&self, key: &str, value: impl Into<ConfigValue>) -> Self {
        Self {
            recipe_file: self.recipe_file.clone(),
            index: self.index,
            config: self.config.clone().with(key, value),
        }
    }

    /// Declared `name`, or the recipe file stem.
    pub fn name(&self) -> String {
        self.config.get_scalar("name").unwrap_or_else(|| {
            self.recipe_file
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "recipe".to_owned())
        })
    }

    /// Declared `output_format`; absent or null means [`OutputFormat::Agent`].
    pub fn output_format(&self) -> Result<OutputFormat, ConfigError> {
        match self.config.get("output_format") {
            None | Some(ConfigValue::Null) => Ok(OutputFormat::Agent),
            Some(v) => match v.to_scalar_string() {
                Some(s) => s.parse(),
                None => Err(ConfigError::WrongType {
                    key: "output_format".to_owned(),
                    expected: "a string",
                    found: v.kind(),
                }),
            },
        }
    }

    /// Number of sections in the owning document, when injected.
    pub fn total_sections(&self) -> usize {
        match self.config.get(KEY_TOTAL_SECTIONS) {
            Some(ConfigValue::Integer(n)) if *n > 0 => *n as usize,
            _ => 1,
        }
    }

    /// Short label for diagnostics: `file.md#2`.
    pub fn label(&self) -> String {
        let file = self
            .recipe_file
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{file}#{}", self.index + 1)
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// The fenced configuration block of a recipe body, if any.
pub fn extract_config_block(body: &str) -> Option<String> {
    let normalized = body.replace("\r\n", "\n");
    config_block_regex()
        .captures(&normalized)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Parse every mapping document in a YAML stream. Non-mapping documents are dropped.
pub fn parse_config_documents(yaml: &str) -> Result<Vec<ConfigMap>, serde_yaml::Error> {
    let mut docs = Vec::new();
    for doc in serde_yaml::Deserializer::from_str(yaml) {
        let value = serde_yaml::Value::deserialize(doc)?;
        if let ConfigValue::Mapping(map) = ConfigValue::from(value) {
            docs.push(map);
        }
    }
    Ok(docs)
}

/// Apply inheritance from the first document and number the sections.
pub fn build_sections(recipe_file: &Path, docs: Vec<ConfigMap>) -> Vec<RecipeSection> {
    let Some(first) = docs.first() else {
        return Vec::new();
    };
    let inherited = first.extract(INHERITED_KEYS);
    docs.iter()
        .enumerate()
        .map(|(index, raw)| RecipeSection::new(recipe_file, index, inherited.overlay(raw)))
        .collect()
}

/// Parse recipe text into its sections.
pub fn parse_recipe_str(recipe_file: &Path, text: &str) -> Result<Vec<RecipeSection>, RecipeError> {
    let doc = Document::parse(text).map_err(|source| RecipeError::Document {
        path: recipe_file.to_path_buf(),
        source,
    })?;
    let block = extract_config_block(&doc.body).ok_or_else(|| RecipeError::NoConfigurationBlock {
        path: recipe_file.to_path_buf(),
    })?;
    let docs = parse_config_documents(&block).map_err(|source| RecipeError::Yaml {
        path: recipe_file.to_path_buf(),
        source,
    })?;
    if docs.is_empty() {
        return Err(RecipeError::EmptyConfiguration {
            path: recipe_file.to_path_buf(),
        });
    }
    Ok(build_sections(recipe_file, docs))
}

/// Read and parse the recipe at `path`.
pub fn parse_recipe_at(path: &Path) -> Result<Vec<RecipeSection>, RecipeError> {
    let text = std::fs::read_to_string(path).map_err(|source| RecipeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_recipe_str(path, &text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
