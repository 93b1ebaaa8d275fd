//! # workshop-sync
//!
//! Content-gated deployment of staged artifacts to their declared targets.
//!
//! - [`engine`]: [`sync_all`], orphan purge and manifest update
//! - [`copy`]: SHA-256 gated file copy and directory mirroring
//! - [`orphan`]: deployments that no recipe produces any more
//! - [`registry`]: Kiro power registry bookkeeping
//! - [`diff`]: unified diffs between targets and staged artifacts

pub mod copy;
pub mod diff;
pub mod engine;
pub mod error;
pub mod orphan;
pub mod registry;

pub use copy::{CopyResult, TargetChanges};
pub use diff::{diff_all, diff_all_at, DiffReport, FileDiff};
pub use engine::{
    plan_workshop_at, sync_all, sync_all_at, DeploymentOutcome, Planning, SyncFailure, SyncOptions,
    SyncReport,
};
pub use error::SyncError;
pub use orphan::{Orphan, PurgeOutcome, TargetKind};
pub use registry::RegistryUpdate;
