//! Orphan detection and purge.
//!
//! An orphan is a deployment recorded in the manifest whose id no longer
//! comes out of any current recipe. Its recorded targets are deleted, but only
//! when the on-disk kind matches what the deployment produced.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use workshop_core::{paths, plan};

/// What a deployment put at each of its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    File,
    Directory,
}

impl TargetKind {
    /// Skill and power deployments are bundles; everything else is a file.
    pub fn for_deployment(deployment_id: &str) -> Self {
        let bundle = [plan::SKILL_DIR, plan::POWER_DIR]
            .iter()
            .any(|dir| deployment_id.starts_with(&format!("{dir}/")));
        if bundle {
            TargetKind::Directory
        } else {
            TargetKind::File
        }
    }

    fn label(self) -> &'static str {
        match self {
            TargetKind::File => "file",
            TargetKind::Directory => "directory",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub deployment_id: String,
    pub kind: TargetKind,
    pub targets: Vec<String>,
}

/// Previous deployments whose ids are absent from `current`, in manifest order.
pub fn find_orphans(previous: &[(String, Vec<String>)], current: &HashSet<&str>) -> Vec<Orphan> {
    previous
        .iter()
        .filter(|(id, _)| !current.contains(id.as_str()))
        .map(|(id, targets)| Orphan {
            deployment_id: id.clone(),
            kind: TargetKind::for_deployment(id),
            targets: targets.clone(),
        })
        .collect()
}

/// What happened to one orphan's targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeOutcome {
    pub deployment_id: String,
    /// Removed (or, in dry-run, would be removed).
    pub removed: Vec<PathBuf>,
    /// Present on disk with the other kind; left alone.
    pub kept: Vec<PathBuf>,
    pub failures: Vec<String>,
}

impl PurgeOutcome {
    /// No target failed to delete; the manifest entry can go.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Delete every recorded target of `orphan`, resolving `~` against `home`.
///
/// Failures are collected per target, never returned early.
pub fn purge_at(orphan: &Orphan, home: &Path, dry_run: bool) -> PurgeOutcome {
    let mut outcome = PurgeOutcome {
        deployment_id: orphan.deployment_id.clone(),
        ..PurgeOutcome::default()
    };

    for target in orphan.targets.iter().filter(|t| !t.trim().is_empty()) {
        let path = PathBuf::from(paths::expand_at(target, home));
        let meta = match std::fs::symlink_metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(deployment = %orphan.deployment_id, path = %path.display(), "already gone");
                continue;
            }
            Err(e) => {
                outcome.failures.push(format!("{}: {e}", path.display()));
                continue;
            }
        };

        let on_disk = if meta.is_dir() {
            TargetKind::Directory
        } else {
            TargetKind::File
        };
        if on_disk != orphan.kind {
            tracing::warn!(
                deployment = %orphan.deployment_id,
                path = %path.display(),
                expected = orphan.kind.label(),
                "orphan target has the other kind; left in place"
            );
            outcome.kept.push(path);
            continue;
        }

        if dry_run {
            tracing::info!(deployment = %orphan.deployment_id, path = %path.display(), "[dry-run] would purge");
            outcome.removed.push(path);
            continue;
        }

        let result = match orphan.kind {
            TargetKind::File => std::fs::remove_file(&path),
            TargetKind::Directory => std::fs::remove_dir_all(&path),
        };
        match result {
            Ok(()) => {
                tracing::info!(deployment = %orphan.deployment_id, path = %path.display(), "purged orphan");
                outcome.removed.push(path);
            }
            Err(e) => {
                tracing::warn!(deployment = %orphan.deployment_id, path = %path.display(), error = %e, "purge failed");
                outcome.failures.push(format!("{}: {e}", path.display()));
            }
        }
    }
    outcome
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
