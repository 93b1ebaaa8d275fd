//! Workshop: recipe assembly and deployment CLI.
//!
//! # Usage
//!
//! ```text
//! workshop [--root <dir>] [--verbose] assemble [--dry-run] [--strict]
//! workshop [--root <dir>] [--verbose] sync [--dry-run] [--strict]
//! workshop [--root <dir>] diff
//! workshop [--root <dir>] status [--json]
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{assemble::AssembleArgs, diff::DiffArgs, status::StatusArgs, sync::SyncArgs};
use workshop_core::WorkshopLayout;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "workshop",
    version,
    about = "Assemble recipe documents into assistant artifacts and deploy them",
    long_about = None,
)]
struct Cli {
    /// Context root holding the `workshop/` directory (defaults to the current directory).
    #[arg(long, global = true, env = "WORKSHOP_ROOT")]
    root: Option<PathBuf>,

    /// Log at debug level regardless of `RUST_LOG`.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build every recipe into the staging area and record the results.
    Assemble(AssembleArgs),

    /// Deploy staged artifacts to their targets and purge orphans.
    Sync(SyncArgs),

    /// Show unified diffs between deployed files and staged artifacts.
    Diff(DiffArgs),

    /// List the deployments recorded in the manifest.
    Status(StatusArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("could not determine current directory")?,
    };
    let layout = WorkshopLayout::new(root);
    tracing::debug!(root = %layout.root.display(), "context root");

    match cli.command {
        Commands::Assemble(args) => args.run(&layout),
        Commands::Sync(args) => args.run(&layout),
        Commands::Diff(args) => args.run(&layout),
        Commands::Status(args) => args.run(&layout),
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
