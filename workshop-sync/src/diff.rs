//! Drift diff support for `workshop diff`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use similar::TextDiff;

use workshop_core::WorkshopLayout;

use crate::engine::{plan_workshop_at, SyncFailure};
use crate::error::{io_err, SyncError};

/// One target whose content differs from the staged artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub deployment_id: String,
    pub target: PathBuf,
    pub unified_diff: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffReport {
    pub diffs: Vec<FileDiff>,
    /// Deployments with no staged artifact to compare against.
    pub missing: Vec<String>,
    /// Unreadable staged artifacts or targets; `subject` is the deployment id.
    pub failures: Vec<SyncFailure>,
}

impl DiffReport {
    fn fail(&mut self, deployment_id: &str, error: SyncError) {
        tracing::warn!(deployment = %deployment_id, error = %error, "target not diffed");
        self.failures.push(SyncFailure {
            subject: deployment_id.to_owned(),
            message: error.to_string(),
        });
    }
}

/// Compare every file deployment's targets with its staged artifact.
///
/// No files are written. Bundle deployments are not diffed.
pub fn diff_all_at(layout: &WorkshopLayout, home: &Path) -> Result<DiffReport, SyncError> {
    layout.require_recipes_dir()?;
    layout.require_output_dir()?;
    let planning = plan_workshop_at(layout, home)?;
    let mut report = DiffReport::default();

    for item in planning.items.iter().filter(|i| !i.source_is_dir) {
        let staged_path = layout.output_dir.join(&item.source_relpath);
        if !staged_path.is_file() {
            report.missing.push(item.deployment_id.clone());
            continue;
        }
        let staged = match read_existing_or_empty(&staged_path) {
            Ok(staged) => staged,
            Err(e) => {
                report.fail(&item.deployment_id, e);
                continue;
            }
        };

        for target in &item.targets {
            let target = PathBuf::from(target);
            let existing = match read_existing_or_empty(&target) {
                Ok(existing) => existing,
                Err(e) => {
                    report.fail(&item.deployment_id, e);
                    continue;
                }
            };
            if existing == staged {
                continue;
            }
            let old_header = format!("a/{}", target.display());
            let new_header = format!("b/{}", item.source_relpath);
            let unified = TextDiff::from_lines(&existing, &staged)
                .unified_diff()
                .header(&old_header, &new_header)
                .context_radius(3)
                .to_string();
            report.diffs.push(FileDiff {
                deployment_id: item.deployment_id.clone(),
                target,
                unified_diff: unified,
            });
        }
    }
    Ok(report)
}

/// [`diff_all_at`] with the current user's home.
pub fn diff_all(layout: &WorkshopLayout) -> Result<DiffReport, SyncError> {
    diff_all_at(layout, &workshop_core::layout::home()?)
}

fn read_existing_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(normalize_line_endings(&String::from_utf8_lossy(&bytes))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const RECIPE: &str = "# r\n\n```yaml\nname: a\noutput_format: agent\ntarget_locations:\n  - {target}\nsources:\n  - inline: hello\n```\n";

    fn setup(tmp: &TempDir, target: &Path, staged: &str) -> WorkshopLayout {
        let layout = WorkshopLayout::new(tmp.path().join("ctx"));
        std::fs::create_dir_all(layout.output_dir.join("agent/a")).expect("mkdir");
        std::fs::write(
            layout.recipes_dir.join("r.md"),
            RECIPE.replace("{target}", &target.to_string_lossy()),
        )
        .expect("write recipe");
        std::fs::write(layout.output_dir.join("agent/a/AGENTS.md"), staged).expect("write staged");
        layout
    }

    #[test]
    fn differing_target_yields_a_diff() {
        let tmp = TempDir::new().expect("tempdir");
        let target = tmp.path().join("proj/AGENTS.md");
        let layout = setup(&tmp, &target, "hello\n");
        std::fs::create_dir_all(target.parent().expect("parent")).expect("mkdir");
        std::fs::write(&target, "goodbye\n").expect("write");

        let report = diff_all_at(&layout, tmp.path()).expect("diff");
        assert_eq!(report.diffs.len(), 1);
        let diff = &report.diffs[0].unified_diff;
        assert!(diff.contains("-goodbye"));
        assert!(diff.contains("+hello"));
        assert_eq!(std::fs::read_to_string(&target).expect("read"), "goodbye\n");
    }

    #[test]
    fn matching_target_is_quiet() {
        let tmp = TempDir::new().expect("tempdir");
        let target = tmp.path().join("proj/AGENTS.md");
        let layout = setup(&tmp, &target, "hello\r\n");
        std::fs::create_dir_all(target.parent().expect("parent")).expect("mkdir");
        std::fs::write(&target, "hello\n").expect("write");

        let report = diff_all_at(&layout, tmp.path()).expect("diff");
        assert!(report.diffs.is_empty());
    }

    #[test]
    fn unreadable_target_is_recorded_and_the_rest_still_diff() {
        let tmp = TempDir::new().expect("tempdir");
        let blocked = tmp.path().join("x/A.md");
        let layout = setup(&tmp, &blocked, "hello\n");
        std::fs::write(layout.output_dir.join("agent/a/A.md"), "hello\n").expect("write staged");
        std::fs::create_dir_all(&blocked).expect("directory at file target");

        let healthy = tmp.path().join("y/B.md");
        std::fs::write(
            layout.recipes_dir.join("s.md"),
            RECIPE
                .replace("name: a", "name: b")
                .replace("{target}", &healthy.to_string_lossy()),
        )
        .expect("write second recipe");
        std::fs::create_dir_all(layout.output_dir.join("agent/b")).expect("mkdir");
        std::fs::write(layout.output_dir.join("agent/b/B.md"), "hello\n").expect("write staged");

        let report = diff_all_at(&layout, tmp.path()).expect("diff");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].subject, "agent/a/A");
        assert_eq!(report.diffs.len(), 1);
        assert_eq!(report.diffs[0].target, healthy);
    }

    #[test]
    fn missing_target_diffs_against_empty() {
        let tmp = TempDir::new().expect("tempdir");
        let target = tmp.path().join("proj/AGENTS.md");
        let layout = setup(&tmp, &target, "hello\n");

        let report = diff_all_at(&layout, tmp.path()).expect("diff");
        assert_eq!(report.diffs.len(), 1);
        assert!(!target.exists());
    }
}
