//! `skill`: a directory bundle:
//!
//! ```text
//! skill/<name>/
//!   SKILL.md              (header + assembled `skill_md` body)
//!   references/<item>
//!   assets/<item>
//!   scripts/<item>
//! ```
//!
//! With `also_output_as_power` a companion `power/<name>/` bundle is derived:
//! `POWER.md` (same header, `derived_from: skill`, same body) plus every
//! markdown reference copied to `steering/`.

use std::sync::OnceLock;

use regex::Regex;
use workshop_core::{plan::Deliverable, ConfigMap, Document, PlannedOutput, RecipeSection};

use crate::builder::{
    assemble_text, planned_for, resolve_role_files, role_items, source_roles,
    with_trailing_newline, BuildContext, RoleFile, SectionOutput,
};
use crate::error::BuildError;
use crate::power::{POWER_FILE, STEERING_DIR};

pub const SKILL_FILE: &str = "SKILL.md";
/// Roles copied verbatim into same-named subdirectories.
pub const FILE_ROLES: &[&str] = &["references", "assets", "scripts"];
pub const MAX_DESCRIPTION_CHARS: usize = 1024;

fn skill_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z0-9-]{1,64}$").expect("valid skill name regex"))
}

/// Header fields checked when `validate_agentskills_spec` is set.
pub fn validate_header(header: &ConfigMap) -> Vec<String> {
    let mut violations = Vec::new();
    match header.get_scalar("name") {
        Some(name) if skill_name_regex().is_match(&name) => {}
        Some(name) => violations.push(format!(
            "name '{name}' must be 1-64 lowercase letters, digits or hyphens"
        )),
        None => violations.push("name is required".to_owned()),
    }
    if let Some(description) = header.get_scalar("description") {
        let chars = description.chars().count();
        if chars > MAX_DESCRIPTION_CHARS {
            violations.push(format!(
                "description is {chars} characters (max {MAX_DESCRIPTION_CHARS})"
            ));
        }
    }
    violations
}

/// `name` (defaulted), `description`, then `metadata` laid on top.
pub(crate) fn header_for(section: &RecipeSection) -> Result<ConfigMap, BuildError> {
    let mut header = ConfigMap::new().with("name", section.name());
    if let Some(description) = section.config().get("description") {
        header.insert("description", description.clone());
    }
    if let Some(metadata) = section.config().mapping("metadata")? {
        header = header.overlay(metadata);
    }
    Ok(header)
}

pub(crate) fn build(
    ctx: &BuildContext,
    section: &RecipeSection,
    planned: &[PlannedOutput],
    out: &mut SectionOutput,
) -> Result<(), BuildError> {
    let Some(skill_item) = planned_for(planned, Deliverable::SkillBundle) else {
        return Ok(());
    };
    let roles = source_roles(section)?;

    let header = header_for(section)?;
    if section.config().flag("validate_agentskills_spec") {
        let violations = validate_header(&header);
        if !violations.is_empty() {
            return Err(BuildError::Validation {
                artifact: skill_item.source_relpath.clone(),
                violations,
            });
        }
    }

    let body = assemble_text(ctx, section, &role_items(&roles, "skill_md")?, out);
    if body.trim().is_empty() {
        return Err(BuildError::EmptyContent {
            artifact: format!("{}/{SKILL_FILE}", skill_item.source_relpath),
        });
    }

    let skill_md = Document::new(header.clone(), with_trailing_newline(body.clone())).render()?;
    let root = &skill_item.source_relpath;
    ctx.reset_bundle(root)?;
    ctx.stage(&format!("{root}/{SKILL_FILE}"), skill_md.as_bytes())?;

    let mut references: Vec<RoleFile> = Vec::new();
    for role in FILE_ROLES {
        let files = resolve_role_files(ctx, section, role, &role_items(&roles, role)?, None, out);
        for file in &files {
            ctx.stage(&format!("{root}/{role}/{}", file.filename), &file.bytes)?;
        }
        if *role == "references" {
            references = files;
        }
    }
    out.artifacts.push(ctx.artifact(skill_item));

    if let Some(power_item) = planned_for(planned, Deliverable::PowerFromSkill) {
        let power_header = header.with("derived_from", "skill");
        let power_md = Document::new(power_header, with_trailing_newline(body)).render()?;
        let power_root = &power_item.source_relpath;
        ctx.reset_bundle(power_root)?;
        ctx.stage(&format!("{power_root}/{POWER_FILE}"), power_md.as_bytes())?;
        for file in references.iter().filter(|f| is_markdown(&f.filename)) {
            ctx.stage(
                &format!("{power_root}/{STEERING_DIR}/{}", file.filename),
                &file.bytes,
            )?;
        }
        out.artifacts.push(ctx.artifact(power_item));
    }
    Ok(())
}

pub(crate) fn is_markdown(filename: &str) -> bool {
    filename.to_ascii_lowercase().ends_with(".md")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_header_passes() {
        let header = ConfigMap::new().with("name", "pdf-tools").with("description", "Reads PDFs");
        assert!(validate_header(&header).is_empty());
    }

    #[test]
    fn bad_name_and_long_description_are_both_reported() {
        let header = ConfigMap::new()
            .with("name", "PDF Tools")
            .with("description", "x".repeat(MAX_DESCRIPTION_CHARS + 1));
        assert_eq!(validate_header(&header).len(), 2);
    }

    #[test]
    fn description_limit_counts_characters() {
        let header = ConfigMap::new()
            .with("name", "ok")
            .with("description", "é".repeat(MAX_DESCRIPTION_CHARS));
        assert!(validate_header(&header).is_empty());
    }
}
