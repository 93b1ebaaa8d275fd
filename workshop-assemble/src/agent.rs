//! `agent`: one flat instruction file per section.
//!
//! Sources are an ordered list; parts are joined with a blank line and then
//! run through the optional `template`. A template without a `{content}`
//! placeholder keeps its text and gets the content appended after it.

use workshop_core::{plan::Deliverable, PlannedOutput, RecipeSection};

use crate::builder::{assemble_text, planned_for, with_trailing_newline, BuildContext, SectionOutput};
use crate::error::BuildError;

pub const CONTENT_PLACEHOLDER: &str = "{content}";

/// Apply `template` to assembled content.
pub fn apply_template(template: Option<&str>, content: &str) -> String {
    match template {
        None => content.to_owned(),
        Some(t) if t.contains(CONTENT_PLACEHOLDER) => t.replace(CONTENT_PLACEHOLDER, content),
        Some(t) if t.trim().is_empty() => content.to_owned(),
        Some(t) => format!("{}\n\n{content}", t.trim_end()),
    }
}

pub(crate) fn build(
    ctx: &BuildContext,
    section: &RecipeSection,
    planned: &[PlannedOutput],
    out: &mut SectionOutput,
) -> Result<(), BuildError> {
    let Some(item) = planned_for(planned, Deliverable::AgentFile) else {
        return Ok(());
    };

    let sources = section.config().sequence("sources")?.unwrap_or_default();
    let content = assemble_text(ctx, section, sources, out);
    if content.trim().is_empty() {
        return Err(BuildError::EmptyContent {
            artifact: item.source_relpath.clone(),
        });
    }

    let text = apply_template(section.config().get_str("template"), &content);
    ctx.stage(&item.source_relpath, with_trailing_newline(text).as_bytes())?;
    tracing::debug!(
        section = %section.label(),
        relpath = %item.source_relpath,
        targets = item.targets.len(),
        "agent artifact staged"
    );
    out.artifacts.push(ctx.artifact(item));
    Ok(())
}
