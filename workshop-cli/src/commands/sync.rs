//! `workshop sync`: deploy staged artifacts to every declared target.

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use workshop_core::WorkshopLayout;
use workshop_sync::{sync_all, SyncOptions, SyncReport};

use super::dry_run_prefix;

/// Arguments for `workshop sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Show what would be copied or removed without touching any target.
    #[arg(long)]
    pub dry_run: bool,

    /// Exit non-zero when any deployment failed.
    #[arg(long)]
    pub strict: bool,
}

impl SyncArgs {
    pub fn run(self, layout: &WorkshopLayout) -> Result<()> {
        let report = sync_all(layout, SyncOptions { dry_run: self.dry_run })
            .with_context(|| format!("sync failed under '{}'", layout.root.display()))?;

        print_report(&report);

        if self.strict && !report.is_clean() {
            bail!("{} item(s) failed to sync", report.failures.len());
        }
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    let prefix = dry_run_prefix(report.dry_run);

    for orphan in report.orphans.iter().filter(|o| !o.removed.is_empty()) {
        println!("{prefix}{} purged orphan {}", "✓".green(), orphan.deployment_id);
        for path in &orphan.removed {
            println!("  ✗  {}", path.display());
        }
    }

    for deployment in &report.deployments {
        let changes = &deployment.changes;
        if changes.is_noop() {
            println!("{prefix}{} {} (up to date)", "✓".green(), deployment.deployment_id);
            continue;
        }
        println!(
            "{prefix}{} {} ({} written, {} unchanged, {} removed)",
            "✓".green(),
            deployment.deployment_id,
            changes.written.len(),
            changes.unchanged,
            changes.removed.len(),
        );
        for path in &changes.written {
            println!("  ✎  {}", path.display());
        }
        for path in &changes.removed {
            println!("  ✗  {}", path.display());
        }
    }

    for id in &report.missing {
        println!("{} {id}: no staged artifact; run `workshop assemble` first", "!".yellow());
    }
    for failure in &report.failures {
        println!("{} {}: {}", "✗".red(), failure.subject, failure.message);
    }

    println!(
        "{prefix}Synced {} deployment(s), cleaned {} orphaned target(s)",
        report.deployments.len(),
        report.cleaned(),
    );
}
