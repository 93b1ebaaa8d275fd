//! Content-gated copies and directory mirroring.
//!
//! Every write goes through [`copy_file`]: the source bytes are hashed and
//! compared with the target's, and only a differing target is rewritten
//! (`<path>.workshop.tmp` then rename). A repeated sync therefore touches
//! nothing on disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::error::{io_err, walk_err, SyncError};

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of copying a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyResult {
    /// The target was missing or differed and has been replaced.
    Copied { path: PathBuf },
    /// The target already holds the same bytes.
    Unchanged { path: PathBuf },
    /// `--dry-run` mode: the target *would* have been replaced.
    WouldCopy { path: PathBuf },
}

/// Changes made (or, in dry-run, planned) for one target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetChanges {
    pub written: Vec<PathBuf>,
    pub unchanged: usize,
    pub removed: Vec<PathBuf>,
}

impl TargetChanges {
    pub fn is_noop(&self) -> bool {
        self.written.is_empty() && self.removed.is_empty()
    }

    pub fn record(&mut self, result: CopyResult) {
        match result {
            CopyResult::Copied { path } | CopyResult::WouldCopy { path } => self.written.push(path),
            CopyResult::Unchanged { .. } => self.unchanged += 1,
        }
    }

    pub fn absorb(&mut self, other: TargetChanges) {
        self.written.extend(other.written);
        self.unchanged += other.unchanged;
        self.removed.extend(other.removed);
    }
}

// ---------------------------------------------------------------------------
// Hashing
// ---------------------------------------------------------------------------

/// Hex-encoded SHA-256 of `bytes`.
pub fn digest(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    hex::encode(h.finalize())
}

/// Digest of the file at `path`, `None` when it does not exist.
pub fn digest_file(path: &Path) -> Result<Option<String>, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(digest(&bytes))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_err(path, e)),
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Copy `source` to `target` unless the target already holds the same bytes.
///
/// Missing parent directories are created. A directory sitting at `target`
/// is never replaced.
pub fn copy_file(source: &Path, target: &Path, dry_run: bool) -> Result<CopyResult, SyncError> {
    if target.is_dir() {
        return Err(SyncError::WrongKind {
            path: target.to_path_buf(),
            expected: "file",
        });
    }

    let bytes = std::fs::read(source).map_err(|e| io_err(source, e))?;
    if digest_file(target)?.as_deref() == Some(digest(&bytes).as_str()) {
        tracing::debug!(target = %target.display(), "unchanged");
        return Ok(CopyResult::Unchanged {
            path: target.to_path_buf(),
        });
    }

    if dry_run {
        tracing::info!(target = %target.display(), "[dry-run] would copy");
        return Ok(CopyResult::WouldCopy {
            path: target.to_path_buf(),
        });
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    let tmp = PathBuf::from(format!("{}.workshop.tmp", target.display()));
    std::fs::write(&tmp, &bytes).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, target) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(target, e));
    }

    tracing::info!(source = %source.display(), target = %target.display(), "copied");
    Ok(CopyResult::Copied {
        path: target.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Directories
// ---------------------------------------------------------------------------

/// Make `target` an exact copy of the bundle at `source`.
///
/// Entries present in the target but absent from the source (or of the other
/// kind) are removed first, deepest-first; then every source file is copied
/// through [`copy_file`].
pub fn mirror_dir(source: &Path, target: &Path, dry_run: bool) -> Result<TargetChanges, SyncError> {
    if !source.is_dir() {
        return Err(io_err(source, std::io::Error::from(ErrorKind::NotFound)));
    }
    if target.exists() && !target.is_dir() {
        return Err(SyncError::WrongKind {
            path: target.to_path_buf(),
            expected: "directory",
        });
    }

    let mut changes = TargetChanges::default();
    if target.is_dir() {
        remove_extras(source, target, dry_run, &mut changes)?;
    } else if !dry_run {
        std::fs::create_dir_all(target).map_err(|e| io_err(target, e))?;
    }

    for entry in WalkDir::new(source).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| walk_err(source, e))?;
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        let dst = target.join(rel);
        if entry.file_type().is_dir() {
            if !dry_run {
                std::fs::create_dir_all(&dst).map_err(|e| io_err(&dst, e))?;
            }
        } else if dry_run && changes.removed.iter().any(|r| dst.starts_with(r)) {
            // Sits under something scheduled for removal; the copy would follow.
            changes.written.push(dst);
        } else {
            changes.record(copy_file(entry.path(), &dst, dry_run)?);
        }
    }
    Ok(changes)
}

fn remove_extras(
    source: &Path,
    target: &Path,
    dry_run: bool,
    changes: &mut TargetChanges,
) -> Result<(), SyncError> {
    for entry in WalkDir::new(target).min_depth(1).contents_first(true) {
        let entry = entry.map_err(|e| walk_err(target, e))?;
        let Ok(rel) = entry.path().strip_prefix(target) else {
            continue;
        };
        let is_dir = entry.file_type().is_dir();
        let keep = std::fs::symlink_metadata(source.join(rel))
            .map(|m| m.is_dir() == is_dir)
            .unwrap_or(false);
        if keep {
            continue;
        }

        let path = entry.path().to_path_buf();
        if dry_run {
            tracing::info!(path = %path.display(), "[dry-run] would remove");
        } else {
            let result = if is_dir {
                std::fs::remove_dir_all(&path)
            } else {
                std::fs::remove_file(&path)
            };
            match result {
                Ok(()) => tracing::info!(path = %path.display(), "removed"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(io_err(&path, e)),
            }
        }
        changes.removed.push(path);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, content).expect("write");
    }

    #[test]
    fn copy_creates_parents_then_reports_unchanged() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src.md");
        let dst = tmp.path().join("deep/nested/dst.md");
        write(&src, "hello\n");

        assert!(matches!(copy_file(&src, &dst, false).expect("copy"), CopyResult::Copied { .. }));
        assert_eq!(std::fs::read_to_string(&dst).expect("read"), "hello\n");
        assert!(matches!(copy_file(&src, &dst, false).expect("copy"), CopyResult::Unchanged { .. }));
    }

    #[test]
    fn dry_run_copy_writes_nothing() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src.md");
        let dst = tmp.path().join("out/dst.md");
        write(&src, "x");

        assert!(matches!(copy_file(&src, &dst, true).expect("copy"), CopyResult::WouldCopy { .. }));
        assert!(!dst.exists());
        assert!(!tmp.path().join("out").exists());
    }

    #[test]
    fn copy_refuses_to_replace_a_directory() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("src.md");
        write(&src, "x");
        let dst = tmp.path().join("taken");
        std::fs::create_dir_all(&dst).expect("mkdir");

        let err = copy_file(&src, &dst, false).unwrap_err();
        assert!(matches!(err, SyncError::WrongKind { expected: "file", .. }));
    }

    #[test]
    fn mirror_copies_and_removes_extras() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("bundle");
        let dst = tmp.path().join("installed");
        write(&src.join("SKILL.md"), "skill");
        write(&src.join("references/a.md"), "a");
        write(&dst.join("references/a.md"), "old a");
        write(&dst.join("references/stale.md"), "stale");
        write(&dst.join("old/deep/file.txt"), "gone");

        let changes = mirror_dir(&src, &dst, false).expect("mirror");

        assert_eq!(std::fs::read_to_string(dst.join("SKILL.md")).expect("read"), "skill");
        assert_eq!(std::fs::read_to_string(dst.join("references/a.md")).expect("read"), "a");
        assert!(!dst.join("references/stale.md").exists());
        assert!(!dst.join("old").exists());
        assert_eq!(changes.written.len(), 2);
        assert!(changes.removed.contains(&dst.join("old")));
    }

    #[test]
    fn mirror_is_a_noop_the_second_time() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("bundle");
        let dst = tmp.path().join("installed");
        write(&src.join("POWER.md"), "p");
        write(&src.join("steering/s.md"), "s");

        mirror_dir(&src, &dst, false).expect("first");
        let second = mirror_dir(&src, &dst, false).expect("second");
        assert!(second.is_noop());
        assert_eq!(second.unchanged, 2);
    }

    #[test]
    fn mirror_replaces_a_file_where_a_directory_belongs() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("bundle");
        let dst = tmp.path().join("installed");
        write(&src.join("steering/s.md"), "s");
        write(&dst.join("steering"), "not a dir");

        mirror_dir(&src, &dst, false).expect("mirror");
        assert_eq!(std::fs::read_to_string(dst.join("steering/s.md")).expect("read"), "s");
    }

    #[test]
    fn dry_run_mirror_reports_without_touching() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("bundle");
        let dst = tmp.path().join("installed");
        write(&src.join("SKILL.md"), "new");
        write(&dst.join("SKILL.md"), "old");
        write(&dst.join("extra.md"), "extra");

        let changes = mirror_dir(&src, &dst, true).expect("mirror");
        assert_eq!(changes.written, vec![dst.join("SKILL.md")]);
        assert_eq!(changes.removed, vec![dst.join("extra.md")]);
        assert_eq!(std::fs::read_to_string(dst.join("SKILL.md")).expect("read"), "old");
        assert!(dst.join("extra.md").exists());
    }

    #[test]
    fn mirror_onto_a_file_target_is_rejected() {
        let tmp = TempDir::new().expect("tempdir");
        let src = tmp.path().join("bundle");
        write(&src.join("a.md"), "a");
        let dst = tmp.path().join("file");
        write(&dst, "x");

        let err = mirror_dir(&src, &dst, false).unwrap_err();
        assert!(matches!(err, SyncError::WrongKind { expected: "directory", .. }));
    }
}
