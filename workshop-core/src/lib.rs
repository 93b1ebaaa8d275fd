//! Workshop core library: recipe model, source resolution, target paths,
//! deployment planning and the manifest store.
//!
//! Public API surface:
//! - [`value`]: [`ConfigValue`] / [`ConfigMap`], the loosely-typed config tree
//! - [`document`]: metadata header + body documents
//! - [`recipe`]: recipe parsing into [`RecipeSection`]s
//! - [`source`]: slice / whole-file / inline source references
//! - [`paths`]: target expansion and classification
//! - [`plan`]: deployment identities and target lists
//! - [`layout`]: workshop directories and recipe discovery
//! - [`manifest`]: the persisted deployment log
//! - [`error`]: error enums shared by the other crates

pub mod document;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod paths;
pub mod plan;
pub mod recipe;
pub mod source;
pub mod value;

pub use document::Document;
pub use error::{ConfigError, DocumentError, LayoutError, ManifestError, RecipeError, SourceError};
pub use layout::WorkshopLayout;
pub use manifest::{Manifest, ManifestEntry, ManifestStore};
pub use plan::{Deliverable, PlannedOutput, SectionPlan, SyncItem};
pub use recipe::{OutputFormat, RecipeSection};
pub use source::{SourceRef, SourceResolver};
pub use value::{ConfigMap, ConfigValue};
