//! `workshop diff`: unified diffs between deployed files and staged artifacts.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use workshop_core::WorkshopLayout;
use workshop_sync::diff_all;

/// Arguments for `workshop diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {}

impl DiffArgs {
    pub fn run(self, layout: &WorkshopLayout) -> Result<()> {
        let report = diff_all(layout)
            .with_context(|| format!("diff failed under '{}'", layout.root.display()))?;

        for id in &report.missing {
            eprintln!("{} {id}: no staged artifact", "!".yellow());
        }
        for failure in &report.failures {
            eprintln!("{} {}: {}", "✗".red(), failure.subject, failure.message);
        }

        if report.diffs.is_empty() {
            println!("No differences.");
            return Ok(());
        }

        for diff in report.diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }
        Ok(())
    }
}
