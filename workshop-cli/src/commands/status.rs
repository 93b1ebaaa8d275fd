//! `workshop status`: deployments recorded in the manifest.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use workshop_core::{ManifestEntry, ManifestStore, WorkshopLayout};

/// Arguments for `workshop status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self, layout: &WorkshopLayout) -> Result<()> {
        layout
            .require_recipes_dir()
            .context("no workshop to report on")?;
        let store = ManifestStore::new(&layout.manifest_path);
        let manifest = store
            .load()
            .with_context(|| format!("failed to read manifest '{}'", layout.manifest_path.display()))?;
        let entries: Vec<&ManifestEntry> = manifest.entries().collect();

        if self.json {
            print_json(&entries)?;
        } else {
            print_table(&entries);
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct EntryJson<'a> {
    id: &'a str,
    output: Option<&'a str>,
    targets: &'a [String],
    status: Option<&'a str>,
    last_run: &'a str,
}

#[derive(Tabled)]
struct StatusTableRow {
    #[tabled(rename = "deployment")]
    id: String,
    #[tabled(rename = "output")]
    output: String,
    #[tabled(rename = "targets")]
    targets: usize,
    #[tabled(rename = "status")]
    status: String,
    #[tabled(rename = "last run")]
    last_run: String,
}

fn print_json(entries: &[&ManifestEntry]) -> Result<()> {
    let payload: Vec<EntryJson<'_>> = entries
        .iter()
        .map(|e| EntryJson {
            id: &e.id,
            output: e.output.as_deref(),
            targets: &e.targets,
            status: e.status.as_deref(),
            last_run: &e.last_run,
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize status JSON")?
    );
    Ok(())
}

fn print_table(entries: &[&ManifestEntry]) {
    println!(
        "Workshop v{} | {} deployment(s)",
        env!("CARGO_PKG_VERSION"),
        entries.len()
    );
    if entries.is_empty() {
        println!("No deployments recorded. Run `workshop assemble` first.");
        return;
    }

    let rows: Vec<StatusTableRow> = entries
        .iter()
        .map(|e| StatusTableRow {
            id: e.id.clone(),
            output: e.output.clone().unwrap_or_default(),
            targets: e.targets.len(),
            status: e.status.clone().unwrap_or_default(),
            last_run: e.last_run.clone(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
}
