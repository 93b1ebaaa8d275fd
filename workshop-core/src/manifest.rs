//! The deployment manifest: a typed model of `recipe-manifest.md`.
//!
//! # Format
//!
//! ```text
//! ---
//! id: recipe-manifest
//! modified: 2026-01-01T10:00:00.000000
//! ---
//!
//! # Recipe Assembly Log
//!
//! ## Active Recipes
//!
//! - **agent/Demo/CLAUDE**: Last run 2026-01-01T10:00:00.000000
//!   - Output: `agent/Demo/CLAUDE.md`
//!   - Target: `/home/ada/.claude/CLAUDE.md`
//!   - Status: ✓ synced
//!
//! ## Deployment Log
//!
//! ### 2026-01-01T10:00:00.000000
//! - Synced 1 deployments
//! ```
//!
//! The document is parsed once into [`Manifest`], mutated through typed
//! operations, and rendered once on save. Only the `Active Recipes` bullets
//! are machine-read; every other section is carried through as raw lines.

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::document::Document;
use crate::error::ManifestError;
use crate::value::{ConfigMap, ConfigValue};

pub const ACTIVE_RECIPES: &str = "Active Recipes";
pub const DEPLOYMENT_LOG: &str = "Deployment Log";
const TITLE: &str = "# Recipe Assembly Log";

pub const STATUS_ASSEMBLED: &str = "✓ assembled";
pub const STATUS_SYNCED: &str = "✓ synced";

/// Local time, microsecond precision, no offset.
pub fn timestamp() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// One deployment record under `Active Recipes`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub id: String,
    pub last_run: String,
    pub output: Option<String>,
    pub targets: Vec<String>,
    pub status: Option<String>,
    /// Unrecognised sub-bullets, kept verbatim.
    pub extra: Vec<String>,
}

impl ManifestEntry {
    pub fn new(
        id: impl Into<String>,
        output: impl Into<String>,
        targets: Vec<String>,
        status: impl Into<String>,
        last_run: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            last_run: last_run.into(),
            output: Some(output.into()),
            targets,
            status: Some(status.into()),
            extra: Vec::new(),
        }
    }

    fn render(&self, out: &mut Vec<String>) {
        out.push(format!("- **{}**: Last run {}", self.id, self.last_run));
        if let Some(output) = &self.output {
            out.push(format!("  - Output: `{output}`"));
        }
        for target in &self.targets {
            out.push(format!("  - Target: `{target}`"));
        }
        if let Some(status) = &self.status {
            out.push(format!("  - Status: {status}"));
        }
        out.extend(self.extra.iter().cloned());
        out.push(String::new());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ActiveItem {
    Entry(ManifestEntry),
    /// Non-entry text inside `Active Recipes`.
    Text(String),
}

/// A `## ` section. `Active` marks where the typed entries render.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Section {
    Active,
    Raw { title: String, lines: Vec<String> },
}

/// In-memory manifest document.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    header: ConfigMap,
    preamble: Vec<String>,
    active: Vec<ActiveItem>,
    sections: Vec<Section>,
}

impl Manifest {
    /// A fresh manifest with both sections present and empty.
    pub fn fresh(now: &str) -> Self {
        let header = ConfigMap::new()
            .with("id", "recipe-manifest")
            .with("created", now)
            .with("modified", now)
            .with("status", "log")
            .with("type", ConfigValue::Sequence(vec![ConfigValue::from("log")]));
        Self {
            header,
            preamble: vec![TITLE.to_owned()],
            active: Vec::new(),
            sections: vec![
                Section::Active,
                Section::Raw {
                    title: DEPLOYMENT_LOG.to_owned(),
                    lines: Vec::new(),
                },
            ],
        }
    }

    /// Parse manifest text. Body structure is read leniently; only a broken
    /// metadata header is an error.
    pub fn parse(text: &str) -> Result<Self, crate::error::DocumentError> {
        let doc = Document::parse(text)?;
        let mut manifest = Self {
            header: doc.header,
            preamble: Vec::new(),
            active: Vec::new(),
            sections: Vec::new(),
        };
        let mut preamble = Vec::new();
        let mut current: Option<(String, Vec<String>)> = None;

        for line in doc.body.lines() {
            if let Some(title) = line.strip_prefix("## ") {
                if let Some((t, lines)) = current.take() {
                    manifest.push_section(t, lines);
                }
                current = Some((title.trim().to_owned(), Vec::new()));
                continue;
            }
            match current.as_mut() {
                Some((_, lines)) => lines.push(line.to_owned()),
                None => preamble.push(line.to_owned()),
            }
        }
        if let Some((t, lines)) = current {
            manifest.push_section(t, lines);
        }
        manifest.preamble = trim_blank(preamble);
        Ok(manifest)
    }

    fn push_section(&mut self, title: String, lines: Vec<String>) {
        // A repeated Active Recipes heading folds into the first one.
        if title == ACTIVE_RECIPES {
            if !self.sections.contains(&Section::Active) {
                self.sections.push(Section::Active);
            }
            self.active.extend(parse_entries(&lines));
        } else {
            self.sections.push(Section::Raw {
                title,
                lines: trim_blank(lines),
            });
        }
    }

    /// Render back to document text.
    pub fn render(&self) -> Result<String, crate::error::DocumentError> {
        let mut lines: Vec<String> = Vec::new();
        if !self.preamble.is_empty() {
            lines.extend(self.preamble.iter().cloned());
            lines.push(String::new());
        }
        for section in &self.sections {
            match section {
                Section::Active => {
                    lines.push(format!("## {ACTIVE_RECIPES}"));
                    lines.push(String::new());
                    for item in &self.active {
                        match item {
                            ActiveItem::Entry(entry) => entry.render(&mut lines),
                            ActiveItem::Text(text) => {
                                lines.push(text.clone());
                                lines.push(String::new());
                            }
                        }
                    }
                }
                Section::Raw { title, lines: raw } => {
                    lines.push(format!("## {title}"));
                    lines.push(String::new());
                    if !raw.is_empty() {
                        lines.extend(raw.iter().cloned());
                        lines.push(String::new());
                    }
                }
            }
        }
        let mut body = lines.join("\n");
        if !body.is_empty() && !body.ends_with('\n') {
            body.push('\n');
        }
        Document::new(self.header.clone(), body).render()
    }

    pub fn header(&self) -> &ConfigMap {
        &self.header
    }

    /// Set `modified` to `now`.
    pub fn touch(&mut self, now: &str) {
        self.header.insert("modified", now);
    }

    fn active_mut(&mut self) -> &mut Vec<ActiveItem> {
        if !self.sections.contains(&Section::Active) {
            self.sections.insert(0, Section::Active);
        }
        &mut self.active
    }

    /// Entries under `Active Recipes`, document order.
    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.active.iter().filter_map(|item| match item {
            ActiveItem::Entry(e) => Some(e),
            ActiveItem::Text(_) => None,
        })
    }

    pub fn entry(&self, id: &str) -> Option<&ManifestEntry> {
        self.entries().find(|e| e.id == id)
    }

    /// Previously recorded targets per deployment id, document order.
    pub fn previous_deployments(&self) -> Vec<(String, Vec<String>)> {
        self.entries()
            .map(|e| (e.id.clone(), e.targets.clone()))
            .collect()
    }

    /// Upsert a batch of entries.
    ///
    /// An existing entry is replaced in place. New entries are inserted at the
    /// top of the section, in batch order.
    pub fn upsert_entries(&mut self, entries: impl IntoIterator<Item = ManifestEntry>) {
        let items = self.active_mut();
        let mut cursor = 0;
        for entry in entries {
            let existing = items
                .iter()
                .position(|item| matches!(item, ActiveItem::Entry(e) if e.id == entry.id));
            match existing {
                Some(idx) => items[idx] = ActiveItem::Entry(entry),
                None => {
                    items.insert(cursor, ActiveItem::Entry(entry));
                    cursor += 1;
                }
            }
        }
    }

    pub fn upsert(&mut self, entry: ManifestEntry) {
        self.upsert_entries(std::iter::once(entry));
    }

    /// Remove the entry for `id`. Returns whether one was present.
    pub fn remove_entry(&mut self, id: &str) -> bool {
        let items = self.active_mut();
        let before = items.len();
        items.retain(|item| !matches!(item, ActiveItem::Entry(e) if e.id == id));
        items.len() != before
    }

    /// Prepend a run record to `Deployment Log`, creating the section at the
    /// end of the document if absent.
    pub fn log_sync(&mut self, now: &str, synced: usize, cleaned: usize) {
        let mut block = vec![format!("### {now}"), format!("- Synced {synced} deployments")];
        if cleaned > 0 {
            block.push(format!("- Cleaned {cleaned} orphaned targets"));
        }

        let existing = self
            .sections
            .iter_mut()
            .find_map(|s| match s {
                Section::Raw { title, lines } if title == DEPLOYMENT_LOG => Some(lines),
                _ => None,
            });
        match existing {
            Some(lines) => {
                if !lines.is_empty() {
                    block.push(String::new());
                }
                lines.splice(0..0, block);
            }
            None => self.sections.push(Section::Raw {
                title: DEPLOYMENT_LOG.to_owned(),
                lines: block,
            }),
        }
    }
}

fn trim_blank(mut lines: Vec<String>) -> Vec<String> {
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }
    let lead = lines.iter().take_while(|l| l.trim().is_empty()).count();
    lines.drain(..lead);
    lines
}

fn backticked(s: &str) -> String {
    let s = s.trim();
    s.strip_prefix('`')
        .and_then(|r| r.strip_suffix('`'))
        .unwrap_or(s)
        .to_owned()
}

fn parse_entry_head(line: &str) -> Option<(String, String)> {
    let rest = line.trim().strip_prefix("- **")?;
    let (id, tail) = rest.split_once("**:")?;
    let last_run = tail.trim().strip_prefix("Last run")?.trim().to_owned();
    Some((id.to_owned(), last_run))
}

fn parse_entries(lines: &[String]) -> Vec<ActiveItem> {
    let mut items = Vec::new();
    let mut current: Option<ManifestEntry> = None;

    for line in lines {
        if let Some((id, last_run)) = parse_entry_head(line) {
            if let Some(done) = current.take() {
                items.push(ActiveItem::Entry(done));
            }
            current = Some(ManifestEntry {
                id,
                last_run,
                output: None,
                targets: Vec::new(),
                status: None,
                extra: Vec::new(),
            });
            continue;
        }

        if line.trim().is_empty() {
            continue;
        }

        let is_sub_bullet = line.starts_with(' ') || line.starts_with('\t');
        match current.as_mut() {
            Some(entry) if is_sub_bullet => {
                let s = line.trim();
                if let Some(v) = s.strip_prefix("- Output:") {
                    entry.output = Some(backticked(v));
                } else if let Some(v) = s.strip_prefix("- Target:") {
                    entry.targets.push(backticked(v));
                } else if let Some(v) = s.strip_prefix("- Status:") {
                    entry.status = Some(v.trim().to_owned());
                } else {
                    entry.extra.push(line.clone());
                }
            }
            _ => {
                if let Some(done) = current.take() {
                    items.push(ActiveItem::Entry(done));
                }
                items.push(ActiveItem::Text(line.clone()));
            }
        }
    }
    if let Some(done) = current {
        items.push(ActiveItem::Entry(done));
    }
    items
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Loads and atomically saves the manifest document at a fixed path.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the manifest; a missing file yields a fresh one.
    pub fn load(&self) -> Result<Manifest, ManifestError> {
        if !self.path.exists() {
            return Ok(Manifest::fresh(&timestamp()));
        }
        let text = std::fs::read_to_string(&self.path).map_err(|source| ManifestError::Io {
            path: self.path.clone(),
            source,
        })?;
        Manifest::parse(&text).map_err(|source| ManifestError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Load the manifest, falling back to a fresh one when it cannot be read.
    pub fn load_or_fresh(&self) -> Manifest {
        match self.load() {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::error!(
                    path = %self.path.display(),
                    error = %e,
                    "manifest unreadable; continuing with empty deployment state"
                );
                Manifest::fresh(&timestamp())
            }
        }
    }

    /// Write the manifest via a `.tmp` sibling and `rename`.
    pub fn save(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        let text = manifest.render().map_err(ManifestError::Render)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ManifestError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp = self.path.with_extension("md.tmp");
        std::fs::write(&tmp, text).map_err(|source| ManifestError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| ManifestError::Io {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
