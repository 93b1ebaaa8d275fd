//! Target path resolution.
//!
//! Targets are kept as strings rather than `PathBuf` because a trailing
//! separator is meaningful: `~/.claude/` is a directory target, `~/.claude`
//! is a file target. Expansion must never add or drop that separator.
//!
//! # API pattern
//!
//! Functions that consult the home directory come in two forms, as in the
//! manifest and registry modules:
//! - `fn_at(…, home: &Path)`: explicit home; used by tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`

use std::path::{Path, PathBuf};

/// Assistant-specific directory segments and the instruction filename each
/// assistant reads. Matching is case-insensitive on whole path segments.
pub const ASSISTANT_FILENAMES: &[(&str, &str)] = &[(".claude", "CLAUDE.md")];

/// Filename read by every assistant without an entry in [`ASSISTANT_FILENAMES`].
pub const GENERIC_FILENAME: &str = "AGENTS.md";

const KIRO_SEGMENT: &str = ".kiro";
const CLAUDE_SEGMENT: &str = ".claude";
const KIRO_HOOK_SUFFIX: &str = ".kiro.hook";
const POWERS_INSTALLED_MARKER: &str = "/.kiro/powers/installed/";

// ---------------------------------------------------------------------------
// Expansion & classification
// ---------------------------------------------------------------------------

/// Replace a leading `~` with `home`, keeping the remainder (and any trailing
/// separator) verbatim.
pub fn expand_at(path: &str, home: &Path) -> String {
    let home = home.to_string_lossy();
    let home = home.trim_end_matches(['/', '\\']);
    if path == "~" {
        return home.to_owned();
    }
    for sep in ['/', '\\'] {
        if let Some(rest) = path.strip_prefix('~').and_then(|r| r.strip_prefix(sep)) {
            return format!("{home}{sep}{rest}");
        }
    }
    path.to_owned()
}

/// [`expand_at`] using the current user's home. Unexpandable paths are returned unchanged.
pub fn expand(path: &str) -> String {
    match dirs::home_dir() {
        Some(home) => expand_at(path, &home),
        None => path.to_owned(),
    }
}

/// A path ending in a separator names a directory target.
pub fn is_dir_target(path: &str) -> bool {
    path.ends_with('/') || path.ends_with('\\')
}

/// Forward slashes, lowercase: the form used for classification.
pub fn normalize(path: &str) -> String {
    path.replace('\\', "/").to_lowercase()
}

fn has_segment(path: &str, segment: &str) -> bool {
    normalize(path).split('/').any(|part| part == segment)
}

/// Instruction filename for a directory target: the assistant-specific name
/// when the path contains that assistant's directory segment, else the generic one.
pub fn default_filename_for(target: &str) -> &'static str {
    ASSISTANT_FILENAMES
        .iter()
        .find(|(segment, _)| has_segment(target, segment))
        .map(|(_, filename)| *filename)
        .unwrap_or(GENERIC_FILENAME)
}

pub fn is_claude_target(path: &str) -> bool {
    has_segment(path, CLAUDE_SEGMENT)
}

/// Anything under a `.kiro` directory.
pub fn is_kiro_target(path: &str) -> bool {
    let np = normalize(path);
    np.contains(&format!("/{KIRO_SEGMENT}/")) || np.starts_with(&format!("{KIRO_SEGMENT}/"))
}

/// A Kiro hook file, or a path under `.kiro/hooks`.
pub fn is_kiro_hook_target(path: &str) -> bool {
    let np = normalize(path);
    np.ends_with(KIRO_HOOK_SUFFIX) || np.contains("/.kiro/hooks/") || np.ends_with("/.kiro/hooks")
}

/// Rewrite a legacy `.kiro/skills/` segment to `.kiro/powers/installed/`,
/// keeping the path's own separators. Other paths are returned unchanged.
pub fn rewrite_kiro_skills_to_powers(path: &str) -> String {
    let np = normalize(path);
    let Some(idx) = np.find("/.kiro/skills") else {
        return path.to_owned();
    };
    // `normalize` keeps byte offsets for ASCII paths; bail out otherwise.
    if np.len() != path.len() {
        return path.to_owned();
    }
    let skills_start = idx + "/.kiro/".len();
    let skills_end = skills_start + "skills".len();
    let after = &path[skills_end..];
    let Some(sep) = after.chars().next().filter(|c| *c == '/' || *c == '\\') else {
        return path.to_owned();
    };
    format!(
        "{}powers{sep}installed{}",
        &path[..skills_start],
        after
    )
}

/// Final path segment of a target, ignoring any trailing separator.
pub fn basename(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches(['/', '\\']);
    trimmed
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty() && *s != "~")
        .map(str::to_owned)
}

/// Power name for a directory installed under `.kiro/powers/installed/`.
pub fn kiro_power_name(target_dir: &Path) -> Option<String> {
    let np = normalize(&target_dir.to_string_lossy());
    if !np.contains(POWERS_INSTALLED_MARKER) {
        return None;
    }
    basename(&target_dir.to_string_lossy())
}

/// Location of the Kiro power registry under `home`.
pub fn kiro_registry_path_at(home: &Path) -> PathBuf {
    home.join(".kiro").join("powers").join("registry.json")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
