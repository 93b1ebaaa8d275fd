//! One module per subcommand; each exposes clap `Args` with a `run` method.

pub mod assemble;
pub mod diff;
pub mod status;
pub mod sync;

/// `[dry-run] ` when nothing is being written.
pub(crate) fn dry_run_prefix(dry_run: bool) -> &'static str {
    if dry_run {
        "[dry-run] "
    } else {
        ""
    }
}
