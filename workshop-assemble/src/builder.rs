//! Artifact builder: format dispatch and the helpers every format shares.
//!
//! [`build_section`] expects a section that has already been through
//! [`workshop_core::plan::disambiguate_at`] together with its siblings; the
//! run loop in [`crate::run`] does that once per document.

use std::fmt;
use std::path::{Path, PathBuf};

use workshop_core::{
    plan::{self, PlannedOutput, SyncItem},
    ConfigError, ConfigMap, ConfigValue, OutputFormat, RecipeSection, SourceRef, SourceResolver,
};

use crate::error::{io_err, BuildError};
use crate::writer::{StagingWriter, WriteResult};
use crate::{agent, command, power, skill};

// ---------------------------------------------------------------------------
// Context & results
// ---------------------------------------------------------------------------

/// Everything a builder needs besides the section itself.
#[derive(Debug, Clone)]
pub struct BuildContext {
    resolver: SourceResolver,
    output_dir: PathBuf,
    home: PathBuf,
    writer: StagingWriter,
}

impl BuildContext {
    pub fn new(
        context_root: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        home: impl Into<PathBuf>,
        dry_run: bool,
    ) -> Self {
        Self {
            resolver: SourceResolver::new(context_root),
            output_dir: output_dir.into(),
            home: home.into(),
            writer: StagingWriter::new(dry_run),
        }
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn dry_run(&self) -> bool {
        self.writer.dry_run()
    }

    /// Write `bytes` at `relpath` under the staging area.
    pub(crate) fn stage(&self, relpath: &str, bytes: &[u8]) -> Result<WriteResult, BuildError> {
        self.writer.write(&self.output_dir.join(relpath), bytes)
    }

    /// Remove a previously staged bundle so the rebuild starts empty.
    /// Dry-run leaves it in place.
    pub(crate) fn reset_bundle(&self, relpath: &str) -> Result<(), BuildError> {
        if self.dry_run() {
            return Ok(());
        }
        let root = self.output_dir.join(relpath);
        match std::fs::remove_dir_all(&root) {
            Ok(()) => {
                tracing::debug!(path = %root.display(), "cleared staged bundle");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&root, e)),
        }
    }

    pub(crate) fn artifact(&self, item: &SyncItem) -> OutputArtifact {
        OutputArtifact {
            relpath: item.source_relpath.clone(),
            abspath: self.output_dir.join(&item.source_relpath),
            targets: item.targets.clone(),
            is_dir: item.source_is_dir,
        }
    }
}

/// One file or directory bundle in the staging area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    /// Relative to the staging root, `/`-separated.
    pub relpath: String,
    pub abspath: PathBuf,
    /// Fully expanded, declaration order.
    pub targets: Vec<String>,
    pub is_dir: bool,
}

impl OutputArtifact {
    pub fn deployment_id(&self) -> String {
        plan::deployment_id(&self.relpath, self.is_dir)
    }
}

/// Artifacts built for one section plus the items skipped along the way.
#[derive(Debug, Default)]
pub struct SectionOutput {
    pub artifacts: Vec<OutputArtifact>,
    pub skipped: Vec<String>,
}

impl SectionOutput {
    /// Record a recovered per-item failure.
    pub(crate) fn skip(&mut self, section: &RecipeSection, what: impl fmt::Display) {
        let message = what.to_string();
        tracing::warn!(section = %section.label(), "{message}");
        self.skipped.push(message);
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Build every artifact a section declares.
///
/// Per-item problems are recovered and listed in [`SectionOutput::skipped`];
/// an `Err` means the section produced nothing usable.
pub fn build_section(ctx: &BuildContext, section: &RecipeSection) -> Result<SectionOutput, BuildError> {
    let format = section.output_format().map_err(BuildError::from_config)?;
    let planned = plan::plan_section_at(section, ctx.home()).map_err(BuildError::from_config)?;

    let mut out = SectionOutput::default();
    match format {
        OutputFormat::Agent => agent::build(ctx, section, &planned, &mut out)?,
        OutputFormat::Skill => skill::build(ctx, section, &planned, &mut out)?,
        OutputFormat::Power => power::build(ctx, section, &planned, &mut out)?,
        OutputFormat::Command | OutputFormat::Prompt | OutputFormat::Hook => {
            command::build(ctx, section, &planned, &mut out)?
        }
    }
    Ok(out)
}

pub(crate) fn planned_for(
    planned: &[PlannedOutput],
    deliverable: plan::Deliverable,
) -> Option<&SyncItem> {
    planned
        .iter()
        .find(|p| p.deliverable == deliverable)
        .map(|p| &p.item)
}

// ---------------------------------------------------------------------------
// Source helpers
// ---------------------------------------------------------------------------

/// The `sources` role mapping; absent means no roles.
pub(crate) fn source_roles(section: &RecipeSection) -> Result<ConfigMap, ConfigError> {
    Ok(section
        .config()
        .mapping("sources")?
        .cloned()
        .unwrap_or_default())
}

/// Items declared for `role`: a sequence, or a single mapping.
pub(crate) fn role_items(roles: &ConfigMap, role: &str) -> Result<Vec<ConfigValue>, ConfigError> {
    match roles.get(role) {
        None | Some(ConfigValue::Null) => Ok(Vec::new()),
        Some(ConfigValue::Sequence(items)) => Ok(items.clone()),
        Some(item @ ConfigValue::Mapping(_)) => Ok(vec![item.clone()]),
        Some(other) => Err(ConfigError::WrongType {
            key: format!("sources.{role}"),
            expected: "a sequence of source references",
            found: other.kind(),
        }),
    }
}

/// Resolve each item to text and join with a blank line. Unusable items are skipped.
pub(crate) fn assemble_text(
    ctx: &BuildContext,
    section: &RecipeSection,
    items: &[ConfigValue],
    out: &mut SectionOutput,
) -> String {
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        let source = match SourceRef::from_value(item) {
            Ok(source) => source,
            Err(e) => {
                out.skip(section, e);
                continue;
            }
        };
        match ctx.resolver().text(&source) {
            Ok(text) => parts.push(text),
            Err(e) => out.skip(section, e),
        }
    }
    parts.join("\n\n")
}

/// A role item resolved to bytes and its output filename.
#[derive(Debug, Clone)]
pub(crate) struct RoleFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Resolve role items to raw bytes. The filename comes from the item's
/// `output_name`, else from the reference itself, else `fallback_name`.
pub(crate) fn resolve_role_files(
    ctx: &BuildContext,
    section: &RecipeSection,
    role: &str,
    items: &[ConfigValue],
    fallback_name: Option<&str>,
    out: &mut SectionOutput,
) -> Vec<RoleFile> {
    let mut files = Vec::new();
    for item in items {
        let source = match SourceRef::from_value(item) {
            Ok(source) => source,
            Err(e) => {
                out.skip(section, format!("{role}: {e}"));
                continue;
            }
        };
        let declared = item.as_mapping().and_then(|m| m.get_scalar("output_name"));
        let filename = match declared
            .or_else(|| source.derived_name())
            .or_else(|| fallback_name.map(str::to_owned))
        {
            Some(name) => name,
            None => {
                out.skip(section, format!("{role}: inline item needs an output_name"));
                continue;
            }
        };
        if let Err(e) = check_filename(&filename) {
            out.skip(section, format!("{role}: {e}"));
            continue;
        }
        match ctx.resolver().bytes(&source) {
            Ok(bytes) => files.push(RoleFile { filename, bytes }),
            Err(e) => out.skip(section, format!("{role}: {e}")),
        }
    }
    files
}

/// A bare filename: no separators, not `.` or `..`.
pub(crate) fn check_filename(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return Err(ConfigError::InvalidItem {
            detail: format!("'{name}' is not a plain file name"),
        });
    }
    Ok(())
}

/// Text files end with a newline.
pub(crate) fn with_trailing_newline(mut text: String) -> String {
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}
