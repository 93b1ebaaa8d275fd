//! Workshop directory layout and recipe discovery.
//!
//! ```text
//! <root>/
//!   workshop/
//!     *.md                   (recipes; not the manifest or template*.md)
//!     recipe-manifest.md     (deployment log)
//!     output/                (staging area)
//! ```

use std::path::{Path, PathBuf};

use crate::error::LayoutError;

pub const WORKSHOP_DIR: &str = "workshop";
pub const OUTPUT_DIR: &str = "output";
pub const MANIFEST_FILE: &str = "recipe-manifest.md";
const TEMPLATE_PREFIX: &str = "template";

/// Paths derived from the context root. Pure, no I/O on construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkshopLayout {
    pub root: PathBuf,
    pub recipes_dir: PathBuf,
    pub output_dir: PathBuf,
    pub manifest_path: PathBuf,
}

impl WorkshopLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let recipes_dir = root.join(WORKSHOP_DIR);
        Self {
            output_dir: recipes_dir.join(OUTPUT_DIR),
            manifest_path: recipes_dir.join(MANIFEST_FILE),
            recipes_dir,
            root,
        }
    }

    /// Fail unless the recipe directory exists.
    pub fn require_recipes_dir(&self) -> Result<(), LayoutError> {
        if self.recipes_dir.is_dir() {
            Ok(())
        } else {
            Err(LayoutError::WorkshopMissing {
                path: self.recipes_dir.clone(),
            })
        }
    }

    /// Fail unless the staging area exists.
    pub fn require_output_dir(&self) -> Result<(), LayoutError> {
        if self.output_dir.is_dir() {
            Ok(())
        } else {
            Err(LayoutError::OutputMissing {
                path: self.output_dir.clone(),
            })
        }
    }

    /// Recipe documents in the recipe directory, sorted by file name.
    ///
    /// Skips the manifest and any `template*` file.
    pub fn discover_recipes(&self) -> Result<Vec<PathBuf>, LayoutError> {
        self.require_recipes_dir()?;
        let entries = std::fs::read_dir(&self.recipes_dir).map_err(|source| LayoutError::Io {
            path: self.recipes_dir.clone(),
            source,
        })?;

        let mut recipes: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .map(|e| e.path())
            .filter(|p| is_recipe_file(p))
            .collect();
        recipes.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(recipes)
    }
}

fn is_recipe_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    name.ends_with(".md") && name != MANIFEST_FILE && !name.starts_with(TEMPLATE_PREFIX)
}

/// Current user's home directory.
pub fn home() -> Result<PathBuf, LayoutError> {
    dirs::home_dir().ok_or(LayoutError::HomeNotFound)
}
