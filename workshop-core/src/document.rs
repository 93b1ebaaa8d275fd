//! Structured text documents: a YAML metadata header followed by free-form body.
//!
//! ```text
//! ---
//! id: recipe-manifest
//! status: log
//! ---
//! # Body text
//! ```
//!
//! A document without an opening `---` line has an empty header and the whole
//! text as body. Line endings are normalised to LF on parse.

use crate::error::DocumentError;
use crate::value::{ConfigMap, ConfigValue};

/// Header delimiter line.
const DELIMITER: &str = "---";

/// A parsed metadata header plus body text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub header: ConfigMap,
    pub body: String,
}

impl Document {
    pub fn new(header: ConfigMap, body: impl Into<String>) -> Self {
        Self {
            header,
            body: body.into(),
        }
    }

    /// Split `text` into header and body.
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        let normalized = text.replace("\r\n", "\n");
        let text = normalized.strip_prefix('\u{feff}').unwrap_or(&normalized);

        let mut lines = text.split('\n');
        match lines.next() {
            Some(first) if first.trim_end() == DELIMITER => {}
            _ => {
                return Ok(Self {
                    header: ConfigMap::new(),
                    body: text.to_owned(),
                })
            }
        }

        let mut header_lines = Vec::new();
        let mut closed = false;
        for line in lines.by_ref() {
            if line.trim_end() == DELIMITER {
                closed = true;
                break;
            }
            header_lines.push(line);
        }
        if !closed {
            return Err(DocumentError::UnclosedHeader);
        }

        let rest: Vec<&str> = lines.collect();
        let body = rest.join("\n");
        let body = body.strip_prefix('\n').unwrap_or(&body).to_owned();

        let header = parse_header(&header_lines.join("\n"))?;
        Ok(Self { header, body })
    }

    /// Serialize back to text. An empty header renders as the bare body.
    pub fn render(&self) -> Result<String, DocumentError> {
        if self.header.is_empty() {
            return Ok(self.body.clone());
        }
        let yaml = render_header(&self.header)?;
        let mut out = String::with_capacity(yaml.len() + self.body.len() + 16);
        out.push_str(DELIMITER);
        out.push('\n');
        out.push_str(&yaml);
        if !yaml.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(DELIMITER);
        out.push_str("\n\n");
        out.push_str(&self.body);
        Ok(out)
    }
}

/// Render a header mapping as YAML text (no delimiters).
pub fn render_header(header: &ConfigMap) -> Result<String, DocumentError> {
    serde_yaml::to_string(&header.to_yaml_mapping()).map_err(DocumentError::Serialize)
}

fn parse_header(yaml: &str) -> Result<ConfigMap, DocumentError> {
    if yaml.trim().is_empty() {
        return Ok(ConfigMap::new());
    }
    let value: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(DocumentError::Header)?;
    match ConfigValue::from(value) {
        ConfigValue::Mapping(map) => Ok(map),
        ConfigValue::Null => Ok(ConfigMap::new()),
        other => Err(DocumentError::HeaderNotMapping { found: other.kind() }),
    }
}
