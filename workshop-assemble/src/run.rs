//! The assembly run: every recipe → staged artifacts + manifest entries.

use std::path::{Path, PathBuf};

use workshop_core::{manifest, plan, recipe, ManifestEntry, ManifestStore, WorkshopLayout};

use crate::builder::{build_section, BuildContext, OutputArtifact};
use crate::error::{io_err, BuildError};

#[derive(Debug, Clone, Copy, Default)]
pub struct AssembleOptions {
    pub dry_run: bool,
}

/// A recovered failure, attributed to its recipe and (when known) section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub recipe: PathBuf,
    /// Zero-based section index; `None` for recipe-level failures.
    pub section: Option<usize>,
    pub message: String,
}

#[derive(Debug, Default)]
pub struct AssemblyReport {
    pub recipes: usize,
    pub artifacts: Vec<OutputArtifact>,
    pub failures: Vec<ItemFailure>,
    pub dry_run: bool,
}

impl AssemblyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, recipe: &Path, section: Option<usize>, message: impl Into<String>) {
        self.failures.push(ItemFailure {
            recipe: recipe.to_path_buf(),
            section,
            message: message.into(),
        });
    }
}

/// Assemble every recipe under `layout`, resolving `~` against `home`.
///
/// Only a missing recipe directory (or an uncreatable staging area) is fatal;
/// everything else is recorded in the report.
pub fn assemble_all_at(
    layout: &WorkshopLayout,
    home: &Path,
    options: AssembleOptions,
) -> Result<AssemblyReport, BuildError> {
    layout.require_recipes_dir()?;
    if !options.dry_run {
        std::fs::create_dir_all(&layout.output_dir).map_err(|e| io_err(&layout.output_dir, e))?;
    }

    let ctx = BuildContext::new(&layout.root, &layout.output_dir, home, options.dry_run);
    let mut report = AssemblyReport {
        dry_run: options.dry_run,
        ..AssemblyReport::default()
    };

    for recipe_path in layout.discover_recipes()? {
        report.recipes += 1;
        let sections = match recipe::parse_recipe_at(&recipe_path) {
            Ok(sections) => sections,
            Err(e) => {
                tracing::warn!(recipe = %recipe_path.display(), error = %e, "skipping recipe");
                report.fail(&recipe_path, None, e.to_string());
                continue;
            }
        };

        for section in plan::disambiguate_at(&sections, home) {
            match build_section(&ctx, &section) {
                Ok(output) => {
                    for message in output.skipped {
                        report.fail(&recipe_path, Some(section.index()), message);
                    }
                    for artifact in &output.artifacts {
                        tracing::info!(
                            section = %section.label(),
                            relpath = %artifact.relpath,
                            targets = artifact.targets.len(),
                            "assembled"
                        );
                    }
                    report.artifacts.extend(output.artifacts);
                }
                Err(e) => {
                    tracing::warn!(section = %section.label(), error = %e, "section not built");
                    report.fail(&recipe_path, Some(section.index()), e.to_string());
                }
            }
        }
    }

    if !options.dry_run && !report.artifacts.is_empty() {
        record_artifacts(layout, &report.artifacts, &mut report.failures);
    }
    Ok(report)
}

/// [`assemble_all_at`] with the current user's home.
pub fn assemble_all(layout: &WorkshopLayout, options: AssembleOptions) -> Result<AssemblyReport, BuildError> {
    assemble_all_at(layout, &workshop_core::layout::home()?, options)
}

fn record_artifacts(layout: &WorkshopLayout, artifacts: &[OutputArtifact], failures: &mut Vec<ItemFailure>) {
    let store = ManifestStore::new(&layout.manifest_path);
    let mut doc = store.load_or_fresh();
    let now = manifest::timestamp();
    doc.upsert_entries(artifacts.iter().map(|a| {
        ManifestEntry::new(
            a.deployment_id(),
            a.relpath.clone(),
            a.targets.clone(),
            manifest::STATUS_ASSEMBLED,
            now.clone(),
        )
    }));
    doc.touch(&now);
    if let Err(e) = store.save(&doc) {
        tracing::error!(path = %layout.manifest_path.display(), error = %e, "manifest not updated");
        failures.push(ItemFailure {
            recipe: layout.manifest_path.clone(),
            section: None,
            message: e.to_string(),
        });
    }
}
