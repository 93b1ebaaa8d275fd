//! Deployment planning: where each section's artifacts live and where they go.
//!
//! Both the assembly run and the sync run derive deployments from recipes
//! through this module, so a deployment's identity, staged path and target
//! list are computed exactly once, the same way, on both sides.
//!
//! # Staging layout
//!
//! | Format              | Staged path                          | Kind |
//! |---------------------|--------------------------------------|------|
//! | agent               | `agent/<name>/<filename>`            | file |
//! | skill               | `skill/<name>/`                      | dir  |
//! | skill → power       | `power/<name>/`                      | dir  |
//! | power               | `power/<name>/`                      | dir  |
//! | command/prompt/hook | `command/<name>/<name>.md`           | file |
//! |                     | `command/<name>/<name>.kiro.hook`    | file |
//!
//! A file deployment's id is its staged path minus the extension; a
//! directory deployment's id is its staged path.

use std::collections::HashMap;
use std::path::Path;

use crate::error::ConfigError;
use crate::paths;
use crate::recipe::{OutputFormat, RecipeSection, KEY_AGENT_DISAMBIGUATOR, KEY_TOTAL_SECTIONS};
use crate::value::ConfigValue;

/// Staging directory per artifact family.
pub const AGENT_DIR: &str = "agent";
pub const SKILL_DIR: &str = "skill";
pub const POWER_DIR: &str = "power";
pub const COMMAND_DIR: &str = "command";

/// Extension of Kiro hook documents.
pub const HOOK_EXTENSION: &str = ".kiro.hook";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// What the builder has to produce for a planned deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deliverable {
    AgentFile,
    SkillBundle,
    PowerFromSkill,
    PowerBundle,
    CommandMarkdown,
    CommandHook,
}

/// One deployment as the sync engine sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncItem {
    pub deployment_id: String,
    /// Relative to the staging root, `/`-separated.
    pub source_relpath: String,
    pub source_is_dir: bool,
    /// Fully expanded, declaration order.
    pub targets: Vec<String>,
}

/// A deployment plus the deliverable that feeds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedOutput {
    pub deliverable: Deliverable,
    pub item: SyncItem,
}

/// A section after document-wide disambiguation, with its planned outputs.
#[derive(Debug, Clone)]
pub struct SectionPlan {
    pub section: RecipeSection,
    pub outputs: Result<Vec<PlannedOutput>, ConfigError>,
}

// ---------------------------------------------------------------------------
// Identity helpers
// ---------------------------------------------------------------------------

/// Strip the final extension of the last path segment (`a/b.kiro.hook` → `a/b.kiro`).
pub fn strip_extension(relpath: &str) -> &str {
    let start = relpath.rfind('/').map(|i| i + 1).unwrap_or(0);
    match relpath[start..].rfind('.') {
        Some(dot) if dot > 0 => &relpath[..start + dot],
        _ => relpath,
    }
}

/// Deployment id for a staged path.
pub fn deployment_id(relpath: &str, is_dir: bool) -> String {
    if is_dir {
        relpath.to_owned()
    } else {
        strip_extension(relpath).to_owned()
    }
}

fn file_item(relpath: String, targets: Vec<String>) -> SyncItem {
    SyncItem {
        deployment_id: deployment_id(&relpath, false),
        source_relpath: relpath,
        source_is_dir: false,
        targets,
    }
}

fn dir_item(relpath: String, targets: Vec<String>) -> SyncItem {
    SyncItem {
        deployment_id: deployment_id(&relpath, true),
        source_relpath: relpath,
        source_is_dir: true,
        targets,
    }
}

// ---------------------------------------------------------------------------
// Targets
// ---------------------------------------------------------------------------

/// Declared `target_locations`, unexpanded. Accepts a sequence of strings or
/// `{path: …}` mappings, or a single string; unusable items are skipped.
pub fn declared_targets(section: &RecipeSection) -> Vec<String> {
    let raw = match section.config().get("target_locations") {
        None | Some(ConfigValue::Null) => return Vec::new(),
        Some(ConfigValue::String(s)) => return vec![s.clone()].into_iter().filter(|s| !s.is_empty()).collect(),
        Some(ConfigValue::Sequence(items)) => items,
        Some(other) => {
            tracing::warn!(
                section = %section.label(),
                found = other.kind(),
                "target_locations must be a sequence; ignoring"
            );
            return Vec::new();
        }
    };

    let mut targets = Vec::new();
    for item in raw {
        let path = match item {
            ConfigValue::String(s) => Some(s.clone()),
            ConfigValue::Mapping(m) => m.get_scalar("path"),
            _ => None,
        };
        match path {
            Some(p) if !p.is_empty() => targets.push(p),
            _ => tracing::warn!(
                section = %section.label(),
                found = item.kind(),
                "skipping target location without a path"
            ),
        }
    }
    targets
}

/// Agent targets: a directory target receives the assistant's default filename.
fn resolve_agent_targets(targets: &[String], home: &Path) -> Vec<String> {
    targets
        .iter()
        .map(|t| {
            let expanded = paths::expand_at(t, home);
            if paths::is_dir_target(t) {
                let filename = paths::default_filename_for(&expanded);
                format!("{expanded}{filename}")
            } else {
                expanded
            }
        })
        .collect()
}

fn expand_all<'a>(targets: impl IntoIterator<Item = &'a String>, home: &Path) -> Vec<String> {
    targets
        .into_iter()
        .map(|t| paths::expand_at(t, home))
        .collect()
}

// ---------------------------------------------------------------------------
// Agent filenames
// ---------------------------------------------------------------------------

/// Agent filename before any collision suffix.
pub fn base_agent_filename(section: &RecipeSection, home: &Path) -> String {
    let name = section.name();
    if let Some(explicit) = section.config().get_scalar("output_name") {
        return explicit;
    }

    let targets = declared_targets(section);
    if let [only] = targets.as_slice() {
        let expanded = paths::expand_at(only, home);
        if paths::is_dir_target(only) {
            return paths::default_filename_for(&expanded).to_owned();
        }
        return paths::basename(&expanded).unwrap_or_else(|| format!("{name}.md"));
    }

    if section.total_sections() <= 1 {
        return format!("{name}.md");
    }
    format!("section{}.md", section.index() + 1)
}

/// Insert `-<suffix>` before the extension: `AGENTS.md` → `AGENTS-section2.md`.
pub fn insert_suffix(filename: &str, suffix: &str) -> String {
    match filename.rfind('.') {
        Some(dot) if dot > 0 => format!("{}-{suffix}{}", &filename[..dot], &filename[dot..]),
        _ => format!("{filename}-{suffix}"),
    }
}

/// Final agent filename, honouring an injected disambiguator.
pub fn agent_filename(section: &RecipeSection, home: &Path) -> String {
    let base = base_agent_filename(section, home);
    match section.config().get_scalar(KEY_AGENT_DISAMBIGUATOR) {
        Some(suffix) => insert_suffix(&base, &suffix),
        None => base,
    }
}

/// Inject `_total_sections` into every section and `_agent_disambiguator`
/// into every agent section whose filename collides with a sibling's.
///
/// Computed once per document, over all sections, before any build.
pub fn disambiguate_at(sections: &[RecipeSection], home: &Path) -> Vec<RecipeSection> {
    let total = sections.len() as i64;
    let counted: Vec<RecipeSection> = sections
        .iter()
        .map(|s| s.with_key(KEY_TOTAL_SECTIONS, total))
        .collect();

    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut names: Vec<Option<String>> = Vec::with_capacity(counted.len());
    for section in &counted {
        if !matches!(section.output_format(), Ok(OutputFormat::Agent)) {
            names.push(None);
            continue;
        }
        let key = base_agent_filename(section, home);
        *counts.entry(key.clone()).or_default() += 1;
        names.push(Some(key));
    }

    counted
        .into_iter()
        .zip(names)
        .map(|(section, key)| match key {
            Some(key) if counts.get(&key).copied().unwrap_or(0) > 1 => {
                let suffix = format!("section{}", section.index() + 1);
                section.with_key(KEY_AGENT_DISAMBIGUATOR, suffix)
            }
            _ => section,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Plan the deployments of one (already disambiguated) section.
pub fn plan_section_at(section: &RecipeSection, home: &Path) -> Result<Vec<PlannedOutput>, ConfigError> {
    let format = section.output_format()?;
    let name = section.name();
    let targets = declared_targets(section);

    let outputs = match format {
        OutputFormat::Agent => {
            let filename = agent_filename(section, home);
            vec![PlannedOutput {
                deliverable: Deliverable::AgentFile,
                item: file_item(
                    format!("{AGENT_DIR}/{name}/{filename}"),
                    resolve_agent_targets(&targets, home),
                ),
            }]
        }
        OutputFormat::Skill => {
            let skill_targets = targets.iter().filter(|t| !paths::is_kiro_target(t));
            let mut outputs = vec![PlannedOutput {
                deliverable: Deliverable::SkillBundle,
                item: dir_item(format!("{SKILL_DIR}/{name}"), expand_all(skill_targets, home)),
            }];
            if section.config().flag("also_output_as_power") {
                let power_targets: Vec<String> = targets
                    .iter()
                    .filter(|t| !paths::is_claude_target(t) && paths::is_kiro_target(t))
                    .map(|t| paths::rewrite_kiro_skills_to_powers(t))
                    .collect();
                outputs.push(PlannedOutput {
                    deliverable: Deliverable::PowerFromSkill,
                    item: dir_item(format!("{POWER_DIR}/{name}"), expand_all(&power_targets, home)),
                });
            }
            outputs
        }
        OutputFormat::Power => vec![PlannedOutput {
            deliverable: Deliverable::PowerBundle,
            item: dir_item(format!("{POWER_DIR}/{name}"), expand_all(&targets, home)),
        }],
        OutputFormat::Command | OutputFormat::Prompt | OutputFormat::Hook => {
            let (hook_targets, md_targets): (Vec<&String>, Vec<&String>) =
                targets.iter().partition(|t| paths::is_kiro_hook_target(t));
            let mut outputs = Vec::new();
            if !md_targets.is_empty() {
                outputs.push(PlannedOutput {
                    deliverable: Deliverable::CommandMarkdown,
                    item: file_item(
                        format!("{COMMAND_DIR}/{name}/{name}.md"),
                        expand_all(md_targets, home),
                    ),
                });
            }
            if !hook_targets.is_empty() {
                outputs.push(PlannedOutput {
                    deliverable: Deliverable::CommandHook,
                    item: file_item(
                        format!("{COMMAND_DIR}/{name}/{name}{HOOK_EXTENSION}"),
                        expand_all(hook_targets, home),
                    ),
                });
            }
            outputs
        }
    };
    Ok(outputs)
}

/// Disambiguate a whole document, then plan each section.
pub fn plan_document_at(sections: &[RecipeSection], home: &Path) -> Vec<SectionPlan> {
    disambiguate_at(sections, home)
        .into_iter()
        .map(|section| {
            let outputs = plan_section_at(&section, home);
            SectionPlan { section, outputs }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
