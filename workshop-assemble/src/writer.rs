//! Dry-run guarded staging writer.
//!
//! Every byte the builders produce goes through [`StagingWriter::write`].
//! Write protocol:
//!
//! 1. Compare with the bytes already on disk → skip if identical.
//! 2. In dry-run, stop here: nothing is created, [`WriteResult::WouldWrite`] is returned.
//! 3. Create the parent directory, write `<path>.workshop.tmp`, rename over the target.

use std::path::{Path, PathBuf};

use crate::error::{io_err, BuildError};

/// Outcome of an individual file write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// File already holds exactly these bytes.
    Unchanged { path: PathBuf },
    /// `--dry-run` mode: the file *would* have been written.
    WouldWrite { path: PathBuf },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path }
            | WriteResult::Unchanged { path }
            | WriteResult::WouldWrite { path } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StagingWriter {
    dry_run: bool,
}

impl StagingWriter {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Write `bytes` to `path` unless it already holds them.
    pub fn write(&self, path: &Path, bytes: &[u8]) -> Result<WriteResult, BuildError> {
        if std::fs::read(path).ok().as_deref() == Some(bytes) {
            tracing::debug!(path = %path.display(), "unchanged");
            return Ok(WriteResult::Unchanged {
                path: path.to_path_buf(),
            });
        }

        if self.dry_run {
            tracing::info!(path = %path.display(), "[dry-run] would write");
            return Ok(WriteResult::WouldWrite {
                path: path.to_path_buf(),
            });
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }
        let tmp = PathBuf::from(format!("{}.workshop.tmp", path.display()));
        std::fs::write(&tmp, bytes).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(path, e));
        }

        tracing::info!(path = %path.display(), "wrote");
        Ok(WriteResult::Written {
            path: path.to_path_buf(),
        })
    }
}
