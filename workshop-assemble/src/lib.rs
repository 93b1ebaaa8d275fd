//! Workshop assembly: recipes in, staged artifacts out.
//!
//! - [`builder`]: [`BuildContext`], format dispatch, shared source helpers
//! - [`agent`], [`skill`], [`power`], [`command`]: one builder per output format
//! - [`writer`]: dry-run guarded staging writes
//! - [`run`]: [`assemble_all`] over every recipe, plus manifest entries

pub mod agent;
pub mod builder;
pub mod command;
pub mod error;
pub mod power;
pub mod run;
pub mod skill;
pub mod writer;

pub use builder::{build_section, BuildContext, OutputArtifact, SectionOutput};
pub use error::BuildError;
pub use run::{assemble_all, assemble_all_at, AssembleOptions, AssemblyReport, ItemFailure};
pub use writer::{StagingWriter, WriteResult};
