//! `command` / `prompt` / `hook`: slash-command markdown and Kiro hooks.
//!
//! Targets decide which artifacts exist: hook-classified targets get
//! `<name>.kiro.hook`, every other target gets `<name>.md`. When only one
//! role is declared, its sources feed both artifacts.

use serde_json::{json, Map, Value};
use workshop_core::{plan::Deliverable, ConfigError, ConfigValue, PlannedOutput, RecipeSection};

use crate::builder::{
    assemble_text, planned_for, role_items, source_roles, with_trailing_newline, BuildContext,
    SectionOutput,
};
use crate::error::BuildError;

/// Markdown roles, first declared wins.
pub const MARKDOWN_ROLES: &[&str] = &["command_md", "prompt_md"];
pub const HOOK_ROLE: &str = "kiro_hook";
const ASK_AGENT: &str = "askAgent";

/// Build the hook document from the declared config and the assembled prompt.
///
/// `then` defaults to `{"type": "askAgent"}`; for `askAgent` the prompt is
/// always the assembled text, whatever the config says.
pub fn hook_document(config: Map<String, Value>, prompt: &str) -> Result<Value, BuildError> {
    let mut hook = config;
    let then = hook
        .entry("then")
        .or_insert_with(|| json!({ "type": ASK_AGENT }));
    let found = json_kind(then);
    match then.as_object_mut() {
        Some(action) => {
            if action.get("type").and_then(Value::as_str) == Some(ASK_AGENT) {
                action.insert("prompt".to_owned(), Value::String(prompt.to_owned()));
            }
        }
        None => {
            return Err(BuildError::Config(ConfigError::WrongType {
                key: "kiro_hook_config.then".to_owned(),
                expected: "a mapping",
                found,
            }))
        }
    }
    Ok(Value::Object(hook))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

pub(crate) fn build(
    ctx: &BuildContext,
    section: &RecipeSection,
    planned: &[PlannedOutput],
    out: &mut SectionOutput,
) -> Result<(), BuildError> {
    let md_item = planned_for(planned, Deliverable::CommandMarkdown);
    let hook_item = planned_for(planned, Deliverable::CommandHook);
    if md_item.is_none() && hook_item.is_none() {
        tracing::warn!(section = %section.label(), "command declares no targets; nothing to build");
        return Ok(());
    }

    let (md_sources, hook_sources) = role_sources(section)?;

    if let Some(item) = md_item {
        let sources = if md_sources.is_empty() { &hook_sources } else { &md_sources };
        let content = assemble_text(ctx, section, sources, out);
        if content.trim().is_empty() {
            out.skip(section, BuildError::EmptyContent {
                artifact: item.source_relpath.clone(),
            });
        } else {
            ctx.stage(&item.source_relpath, with_trailing_newline(content).as_bytes())?;
            out.artifacts.push(ctx.artifact(item));
        }
    }

    if let Some(item) = hook_item {
        let sources = if hook_sources.is_empty() { &md_sources } else { &hook_sources };
        let prompt = assemble_text(ctx, section, sources, out);
        if prompt.trim().is_empty() {
            out.skip(section, BuildError::EmptyContent {
                artifact: item.source_relpath.clone(),
            });
        } else {
            let config = section
                .config()
                .mapping("kiro_hook_config")?
                .map(|m| m.to_json_object())
                .unwrap_or_default();
            let hook = hook_document(config, &prompt)?;
            let text = with_trailing_newline(serde_json::to_string_pretty(&hook)?);
            ctx.stage(&item.source_relpath, text.as_bytes())?;
            out.artifacts.push(ctx.artifact(item));
        }
    }
    Ok(())
}

/// Markdown-role and hook-role sources. A plain `sources` list feeds both.
fn role_sources(section: &RecipeSection) -> Result<(Vec<ConfigValue>, Vec<ConfigValue>), BuildError> {
    if let Some(ConfigValue::Sequence(shared)) = section.config().get("sources") {
        return Ok((shared.clone(), shared.clone()));
    }
    let roles = source_roles(section)?;
    let mut md = Vec::new();
    for role in MARKDOWN_ROLES {
        md = role_items(&roles, role)?;
        if !md.is_empty() {
            break;
        }
    }
    let hook = role_items(&roles, HOOK_ROLE)?;
    Ok((md, hook))
}
