//! `workshop assemble`: build every recipe into the staging area.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use workshop_assemble::{assemble_all, AssembleOptions, AssemblyReport};
use workshop_core::WorkshopLayout;

use super::dry_run_prefix;

/// Arguments for `workshop assemble`.
#[derive(Args, Debug)]
pub struct AssembleArgs {
    /// Show what would be staged without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Exit non-zero when any recipe or section failed.
    #[arg(long)]
    pub strict: bool,
}

impl AssembleArgs {
    pub fn run(self, layout: &WorkshopLayout) -> Result<()> {
        let report = assemble_all(layout, AssembleOptions { dry_run: self.dry_run })
            .with_context(|| format!("assembly failed under '{}'", layout.root.display()))?;

        print_report(&report);

        if self.strict && !report.is_clean() {
            bail!("{} item(s) failed to assemble", report.failures.len());
        }
        Ok(())
    }
}

fn print_report(report: &AssemblyReport) {
    let prefix = dry_run_prefix(report.dry_run);
    if report.recipes == 0 {
        println!("{prefix}No recipes found.");
        return;
    }

    println!(
        "{prefix}{} assembled {} artifact(s) from {} recipe(s)",
        "✓".green(),
        report.artifacts.len(),
        report.recipes,
    );
    for artifact in &report.artifacts {
        println!(
            "  ✎  {} → {} target(s)",
            artifact.relpath,
            artifact.targets.len()
        );
    }

    for failure in &report.failures {
        let file = failure
            .recipe
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| failure.recipe.display().to_string());
        let location = match failure.section {
            Some(index) => format!("{file}#{}", index + 1),
            None => file,
        };
        println!("{} {location}: {}", "✗".red(), failure.message);
    }
}
