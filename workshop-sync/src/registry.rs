//! Kiro power registry (`~/.kiro/powers/registry.json`).
//!
//! When a power bundle is mirrored under `.kiro/powers/installed/<name>/`,
//! the registry entry for `<name>` is marked installed at that path. Updates
//! are best-effort and idempotent: a registry that is missing or unparseable
//! is left alone, and a consistent entry is not rewritten.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Map, Value};

use workshop_core::paths;

use crate::error::{io_err, SyncError};

/// Outcome of a registry update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryUpdate {
    Updated { path: PathBuf },
    Unchanged { path: PathBuf },
    WouldUpdate { path: PathBuf },
    /// Left alone; the reason has already been logged.
    Skipped { path: PathBuf, reason: String },
}

/// Mark `power_name` as installed at `install_path` in the registry under `home`.
pub fn update_power_at(
    home: &Path,
    power_name: &str,
    install_path: &Path,
    dry_run: bool,
) -> Result<RegistryUpdate, SyncError> {
    let path = paths::kiro_registry_path_at(home);
    if !path.is_file() {
        tracing::warn!(path = %path.display(), power = power_name, "power registry not found; update skipped");
        return Ok(RegistryUpdate::Skipped {
            path,
            reason: "registry not found".to_owned(),
        });
    }

    let text = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let mut data = match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Ok(skip(path, power_name, "registry is not a JSON object".to_owned())),
        Err(e) => return Ok(skip(path, power_name, format!("unparseable registry: {e}"))),
    };

    let install = install_path
        .to_string_lossy()
        .trim_end_matches(['/', '\\'])
        .to_owned();
    if !apply(&mut data, power_name, &install) {
        tracing::debug!(path = %path.display(), power = power_name, "registry already up to date");
        return Ok(RegistryUpdate::Unchanged { path });
    }

    if dry_run {
        tracing::info!(path = %path.display(), power = power_name, "[dry-run] would update power registry");
        return Ok(RegistryUpdate::WouldUpdate { path });
    }

    let mut out = serde_json::to_string_pretty(&Value::Object(data))?;
    out.push('\n');
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, out).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, &path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(&path, e));
    }

    tracing::info!(path = %path.display(), power = power_name, install_path = %install, "power registry updated");
    Ok(RegistryUpdate::Updated { path })
}

fn skip(path: PathBuf, power_name: &str, reason: String) -> RegistryUpdate {
    tracing::warn!(path = %path.display(), power = power_name, reason = %reason, "power registry update skipped");
    RegistryUpdate::Skipped { path, reason }
}

/// Bring the entry for `name` in line. Returns `false` when it already was.
fn apply(data: &mut Map<String, Value>, name: &str, install_path: &str) -> bool {
    if !data.get("powers").is_some_and(Value::is_object) {
        data.insert("powers".to_owned(), Value::Object(Map::new()));
    }
    let Some(Value::Object(powers)) = data.get_mut("powers") else {
        return false;
    };

    let mut entry = match powers.get(name) {
        Some(Value::Object(existing)) => existing.clone(),
        _ => {
            let mut fresh = Map::new();
            fresh.insert("name".to_owned(), json!(name));
            fresh.insert("source".to_owned(), json!({ "type": "local" }));
            fresh
        }
    };

    let consistent = entry.get("name").and_then(Value::as_str) == Some(name)
        && entry.get("installed") == Some(&Value::Bool(true))
        && entry.get("installPath").and_then(Value::as_str) == Some(install_path);
    if consistent && powers.contains_key(name) {
        return false;
    }

    entry.insert("name".to_owned(), json!(name));
    entry.insert("installed".to_owned(), json!(true));
    entry.insert("installPath".to_owned(), json!(install_path));
    if !entry.contains_key("installedAt") {
        let now = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
        entry.insert("installedAt".to_owned(), json!(now));
    }
    powers.insert(name.to_owned(), Value::Object(entry));
    true
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed(home: &Path, content: &str) -> PathBuf {
        let path = paths::kiro_registry_path_at(home);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(&path, content).expect("write");
        path
    }

    fn read(path: &Path) -> Value {
        serde_json::from_str(&std::fs::read_to_string(path).expect("read")).expect("json")
    }

    #[test]
    fn missing_registry_is_skipped() {
        let home = TempDir::new().expect("tempdir");
        let result = update_power_at(home.path(), "p", Path::new("/x"), false).expect("update");
        assert!(matches!(result, RegistryUpdate::Skipped { .. }));
        assert!(!paths::kiro_registry_path_at(home.path()).exists());
    }

    #[test]
    fn unparseable_registry_is_left_alone() {
        let home = TempDir::new().expect("tempdir");
        let path = seed(home.path(), "{ not json");
        let result = update_power_at(home.path(), "p", Path::new("/x"), false).expect("update");
        assert!(matches!(result, RegistryUpdate::Skipped { .. }));
        assert_eq!(std::fs::read_to_string(path).expect("read"), "{ not json");
    }

    #[test]
    fn new_entry_gets_defaults() {
        let home = TempDir::new().expect("tempdir");
        let path = seed(home.path(), r#"{"version": 1, "powers": {}}"#);
        let install = home.path().join(".kiro/powers/installed/p");

        let result = update_power_at(home.path(), "p", &install, false).expect("update");
        assert!(matches!(result, RegistryUpdate::Updated { .. }));

        let text = std::fs::read_to_string(&path).expect("read");
        assert!(text.ends_with("}\n"));
        let data = read(&path);
        let entry = &data["powers"]["p"];
        assert_eq!(entry["name"], "p");
        assert_eq!(entry["installed"], true);
        assert_eq!(entry["installPath"], install.to_str().expect("utf-8 path"));
        assert_eq!(entry["source"], json!({ "type": "local" }));
        let at = entry["installedAt"].as_str().expect("installedAt");
        assert!(at.ends_with('Z'));
        assert_eq!(at.len(), "2024-01-01T00:00:00.000Z".len());
        assert_eq!(data["version"], 1);
    }

    #[test]
    fn existing_fields_and_order_survive() {
        let home = TempDir::new().expect("tempdir");
        let path = seed(
            home.path(),
            r#"{"powers": {"p": {"installedAt": "then", "name": "p", "installed": false, "source": {"type": "git"}, "extra": 1}}}"#,
        );

        update_power_at(home.path(), "p", Path::new("/i/p"), false).expect("update");
        let data = read(&path);
        let entry = data["powers"]["p"].as_object().expect("object");
        let keys: Vec<_> = entry.keys().cloned().collect();
        assert_eq!(keys, vec!["installedAt", "name", "installed", "source", "extra", "installPath"]);
        assert_eq!(entry["installedAt"], "then");
        assert_eq!(entry["source"], json!({ "type": "git" }));
        assert_eq!(entry["installed"], true);
    }

    #[test]
    fn consistent_entry_is_not_rewritten() {
        let home = TempDir::new().expect("tempdir");
        let original = r#"{"powers":{"p":{"name":"p","installed":true,"installPath":"/i/p"}}}"#;
        let path = seed(home.path(), original);

        let result = update_power_at(home.path(), "p", Path::new("/i/p"), false).expect("update");
        assert!(matches!(result, RegistryUpdate::Unchanged { .. }));
        assert_eq!(std::fs::read_to_string(path).expect("read"), original);
    }

    #[test]
    fn dry_run_reports_without_writing() {
        let home = TempDir::new().expect("tempdir");
        let path = seed(home.path(), r#"{"powers": {}}"#);
        let result = update_power_at(home.path(), "p", Path::new("/i/p"), true).expect("update");
        assert!(matches!(result, RegistryUpdate::WouldUpdate { .. }));
        assert_eq!(std::fs::read_to_string(path).expect("read"), r#"{"powers": {}}"#);
    }
}
