//! The sync run: staged artifacts → every declared target.
//!
//! ## `sync_all_at` order of work
//!
//! 1. Load the previous deployments from the manifest.
//! 2. Re-plan every recipe (same discovery and planning as assembly).
//! 3. Purge orphans: recorded ids no current recipe produces.
//! 4. Copy file deployments / mirror bundle deployments to their targets,
//!    updating the Kiro power registry for installed powers.
//! 5. Outside dry-run: write entries, drop purged orphans, log the run.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use workshop_core::{
    manifest, paths, plan, recipe, ManifestEntry, ManifestStore, SyncItem, WorkshopLayout,
};

use crate::copy::{copy_file, mirror_dir, TargetChanges};
use crate::error::SyncError;
use crate::orphan::{find_orphans, purge_at, PurgeOutcome};
use crate::registry::{update_power_at, RegistryUpdate};

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    pub dry_run: bool,
}

/// A recovered failure: `subject` is a recipe path or a deployment id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
    pub subject: String,
    pub message: String,
}

/// Current deployments, recomputed from the recipes.
#[derive(Debug, Default)]
pub struct Planning {
    pub recipes: usize,
    pub items: Vec<SyncItem>,
    pub failures: Vec<SyncFailure>,
}

/// One synced deployment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentOutcome {
    pub deployment_id: String,
    /// Staged path, relative to the output directory.
    pub output: String,
    pub targets: Vec<String>,
    pub changes: TargetChanges,
    pub failed_targets: usize,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub deployments: Vec<DeploymentOutcome>,
    pub orphans: Vec<PurgeOutcome>,
    /// Deployments skipped because their staged artifact is absent.
    pub missing: Vec<String>,
    pub registry: Vec<RegistryUpdate>,
    pub failures: Vec<SyncFailure>,
    pub dry_run: bool,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Orphaned targets removed (or, in dry-run, scheduled for removal).
    pub fn cleaned(&self) -> usize {
        self.orphans.iter().map(|o| o.removed.len()).sum()
    }

    pub fn written(&self) -> usize {
        self.deployments.iter().map(|d| d.changes.written.len()).sum()
    }

    pub fn is_noop(&self) -> bool {
        self.cleaned() == 0 && self.deployments.iter().all(|d| d.changes.is_noop())
    }

    fn fail(&mut self, subject: impl Into<String>, message: impl Into<String>) {
        self.failures.push(SyncFailure {
            subject: subject.into(),
            message: message.into(),
        });
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Discover and plan every recipe. Unparseable recipes and unplannable
/// sections are recorded, not fatal. A later duplicate id replaces an earlier
/// one.
pub fn plan_workshop_at(layout: &WorkshopLayout, home: &Path) -> Result<Planning, SyncError> {
    let mut planning = Planning::default();
    for recipe_path in layout.discover_recipes()? {
        planning.recipes += 1;
        let sections = match recipe::parse_recipe_at(&recipe_path) {
            Ok(sections) => sections,
            Err(e) => {
                tracing::warn!(recipe = %recipe_path.display(), error = %e, "skipping recipe");
                planning.failures.push(SyncFailure {
                    subject: recipe_path.display().to_string(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        for section_plan in plan::plan_document_at(&sections, home) {
            let outputs = match section_plan.outputs {
                Ok(outputs) => outputs,
                Err(e) => {
                    tracing::warn!(section = %section_plan.section.label(), error = %e, "section not planned");
                    planning.failures.push(SyncFailure {
                        subject: section_plan.section.label(),
                        message: e.to_string(),
                    });
                    continue;
                }
            };
            for output in outputs {
                let item = output.item;
                match planning
                    .items
                    .iter()
                    .position(|i| i.deployment_id == item.deployment_id)
                {
                    Some(idx) => {
                        tracing::warn!(deployment = %item.deployment_id, "deployment declared twice; last one wins");
                        planning.items[idx] = item;
                    }
                    None => planning.items.push(item),
                }
            }
        }
    }
    Ok(planning)
}

// ---------------------------------------------------------------------------
// Sync
// ---------------------------------------------------------------------------

/// Sync every current deployment under `layout`, resolving `~` against `home`.
///
/// Only a missing recipe directory or staging area is fatal; everything else
/// is recorded in the report.
pub fn sync_all_at(layout: &WorkshopLayout, home: &Path, options: SyncOptions) -> Result<SyncReport, SyncError> {
    layout.require_recipes_dir()?;
    layout.require_output_dir()?;

    let store = ManifestStore::new(&layout.manifest_path);
    let mut doc = store.load_or_fresh();
    let previous = doc.previous_deployments();

    let planning = plan_workshop_at(layout, home)?;
    let mut report = SyncReport {
        dry_run: options.dry_run,
        failures: planning.failures,
        ..SyncReport::default()
    };

    let current: HashSet<&str> = planning.items.iter().map(|i| i.deployment_id.as_str()).collect();
    for orphan in find_orphans(&previous, &current) {
        let outcome = purge_at(&orphan, home, options.dry_run);
        for failure in &outcome.failures {
            report.fail(&orphan.deployment_id, failure.clone());
        }
        report.orphans.push(outcome);
    }

    for item in &planning.items {
        let source = layout.output_dir.join(&item.source_relpath);
        if !source.exists() {
            tracing::warn!(
                deployment = %item.deployment_id,
                source = %source.display(),
                "staged artifact missing; run assemble first"
            );
            report.missing.push(item.deployment_id.clone());
            continue;
        }
        let outcome = sync_item(item, &source, home, options.dry_run, &mut report);
        report.deployments.push(outcome);
    }

    if !options.dry_run {
        let now = manifest::timestamp();
        for orphan in report.orphans.iter().filter(|o| o.is_complete()) {
            doc.remove_entry(&orphan.deployment_id);
        }
        doc.upsert_entries(report.deployments.iter().map(|d| {
            ManifestEntry::new(
                d.deployment_id.clone(),
                d.output.clone(),
                d.targets.clone(),
                status_for(d),
                now.clone(),
            )
        }));
        doc.log_sync(&now, report.deployments.len(), report.cleaned());
        doc.touch(&now);
        if let Err(e) = store.save(&doc) {
            tracing::error!(path = %layout.manifest_path.display(), error = %e, "manifest not updated");
            report.fail(layout.manifest_path.display().to_string(), e.to_string());
        }
    }

    tracing::info!(
        deployments = report.deployments.len(),
        written = report.written(),
        cleaned = report.cleaned(),
        dry_run = options.dry_run,
        "sync finished"
    );
    Ok(report)
}

/// [`sync_all_at`] with the current user's home.
pub fn sync_all(layout: &WorkshopLayout, options: SyncOptions) -> Result<SyncReport, SyncError> {
    sync_all_at(layout, &workshop_core::layout::home()?, options)
}

fn sync_item(item: &SyncItem, source: &Path, home: &Path, dry_run: bool, report: &mut SyncReport) -> DeploymentOutcome {
    let mut outcome = DeploymentOutcome {
        deployment_id: item.deployment_id.clone(),
        output: item.source_relpath.clone(),
        targets: item.targets.clone(),
        ..DeploymentOutcome::default()
    };

    for target in &item.targets {
        let target_path = PathBuf::from(paths::expand_at(target, home));
        let result = if item.source_is_dir {
            mirror_dir(source, &target_path, dry_run)
        } else {
            copy_file(source, &target_path, dry_run).map(|r| {
                let mut changes = TargetChanges::default();
                changes.record(r);
                changes
            })
        };

        match result {
            Ok(changes) => {
                outcome.changes.absorb(changes);
                if item.source_is_dir {
                    register_power(&item.deployment_id, &target_path, home, dry_run, report);
                }
            }
            Err(e) => {
                tracing::warn!(deployment = %item.deployment_id, target = %target, error = %e, "target not synced");
                outcome.failed_targets += 1;
                report.fail(&item.deployment_id, format!("{target}: {e}"));
            }
        }
    }
    outcome
}

fn register_power(deployment_id: &str, target: &Path, home: &Path, dry_run: bool, report: &mut SyncReport) {
    let Some(power_name) = paths::kiro_power_name(target) else {
        return;
    };
    match update_power_at(home, &power_name, target, dry_run) {
        Ok(update) => report.registry.push(update),
        Err(e) => {
            tracing::warn!(deployment = %deployment_id, power = %power_name, error = %e, "power registry not updated");
            report.fail(deployment_id, format!("registry: {e}"));
        }
    }
}

fn status_for(outcome: &DeploymentOutcome) -> String {
    if outcome.failed_targets == 0 {
        manifest::STATUS_SYNCED.to_owned()
    } else {
        format!("✗ {} of {} targets failed", outcome.failed_targets, outcome.targets.len())
    }
}
