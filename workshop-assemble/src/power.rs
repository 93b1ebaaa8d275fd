//! `power`: a directory bundle:
//!
//! ```text
//! power/<name>/
//!   POWER.md              (optional header + assembled `power_md` body)
//!   <mcp_config item>     (raw bytes)
//!   steering/<item>.md
//! ```

use workshop_core::{plan::Deliverable, Document, PlannedOutput, RecipeSection};

use crate::builder::{
    assemble_text, planned_for, resolve_role_files, role_items, source_roles,
    with_trailing_newline, BuildContext, SectionOutput,
};
use crate::error::BuildError;
use crate::skill::{header_for, is_markdown};

pub const POWER_FILE: &str = "POWER.md";
pub const STEERING_DIR: &str = "steering";
const DEFAULT_MCP_NAME: &str = "mcp.json";

pub(crate) fn build(
    ctx: &BuildContext,
    section: &RecipeSection,
    planned: &[PlannedOutput],
    out: &mut SectionOutput,
) -> Result<(), BuildError> {
    let Some(item) = planned_for(planned, Deliverable::PowerBundle) else {
        return Ok(());
    };
    let roles = source_roles(section)?;
    let root = &item.source_relpath;

    let body = assemble_text(ctx, section, &role_items(&roles, "power_md")?, out);
    if body.trim().is_empty() {
        return Err(BuildError::EmptyContent {
            artifact: format!("{root}/{POWER_FILE}"),
        });
    }
    // A header is only emitted when the section declares metadata for it.
    let has_header = section.config().contains_key("metadata")
        || section.config().contains_key("description");
    let power_md = if has_header {
        Document::new(header_for(section)?, with_trailing_newline(body)).render()?
    } else {
        with_trailing_newline(body)
    };
    ctx.reset_bundle(root)?;
    ctx.stage(&format!("{root}/{POWER_FILE}"), power_md.as_bytes())?;

    let mcp = role_items(&roles, "mcp_config")?;
    for file in resolve_role_files(ctx, section, "mcp_config", &mcp, Some(DEFAULT_MCP_NAME), out) {
        ctx.stage(&format!("{root}/{}", file.filename), &file.bytes)?;
    }

    let steering = role_items(&roles, "steering_files")?;
    for file in resolve_role_files(ctx, section, "steering_files", &steering, None, out) {
        if !is_markdown(&file.filename) {
            out.skip(
                section,
                format!("steering_files: '{}' is not a markdown file", file.filename),
            );
            continue;
        }
        ctx.stage(&format!("{root}/{STEERING_DIR}/{}", file.filename), &file.bytes)?;
    }

    out.artifacts.push(ctx.artifact(item));
    Ok(())
}
