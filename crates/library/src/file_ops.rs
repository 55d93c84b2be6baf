//! Reversible file moves
//!
//! A bulk move parks every file under a temporary sibling name first
//! ([`backup_rename`]), then moves each one into place ([`commit`]). Until the
//! batch entry is done, [`rollback`] can put any file back where it was.
//!
//! None of the moves here replace an existing file. A destination that is
//! already taken by another file fails the move with `AlreadyExists`.

use crate::error::{LibraryError, Result};
use folio_core::BookFileId;
use log::{debug, error, warn};
use std::collections::{BTreeSet, HashSet};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// One file relocation within a single bulk entry
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedMove {
    pub file_id: BookFileId,
    pub source: PathBuf,
    pub temp: PathBuf,
    pub target: PathBuf,
    pub committed: bool,
}

impl PlannedMove {
    pub fn new(file_id: BookFileId, source: PathBuf, temp: PathBuf, target: PathBuf) -> Self {
        Self {
            file_id,
            source,
            temp,
            target,
            committed: false,
        }
    }

    /// Where the file currently sits
    pub fn current_path(&self) -> &Path {
        if self.committed {
            &self.target
        } else {
            &self.temp
        }
    }
}

/// Path of the temporary sibling used while `source` is in flight
pub fn backup_path(source: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = source
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    source.with_file_name(name)
}

/// Renames `source` to its backup name in the same directory
pub async fn backup_rename(source: &Path, suffix: &str) -> Result<PathBuf> {
    let temp = backup_path(source, suffix);
    ensure_vacant(source, &temp, "back up").await?;
    fs::rename(source, &temp)
        .await
        .map_err(|e| LibraryError::move_failed("back up", source, &temp, e))?;
    debug!("Backed up {} -> {}", source.display(), temp.display());
    Ok(temp)
}

/// Moves a backed-up file into its final place, creating parent directories
pub async fn commit(temp: &Path, target: &Path) -> Result<()> {
    ensure_vacant(temp, target, "commit").await?;
    ensure_parent(temp, target, "commit").await?;
    move_with_fallback(temp, target)
        .await
        .map_err(|e| LibraryError::move_failed("commit", temp, target, e))?;
    debug!("Committed {} -> {}", temp.display(), target.display());
    Ok(())
}

/// Puts `current` back at `original`. Failures are logged, never returned.
pub async fn rollback(current: &Path, original: &Path) {
    if let Err(e) = move_with_fallback(current, original).await {
        error!(
            "Rollback failed, file left at {} (expected {}): {}",
            current.display(),
            original.display(),
            e
        );
    } else {
        debug!("Rolled back {} -> {}", current.display(), original.display());
    }
}

/// Undoes `moves` in reverse order
pub async fn rollback_all(moves: &[PlannedMove]) {
    for planned in moves.iter().rev() {
        rollback(planned.current_path(), &planned.source).await;
    }
}

/// Undoes `moves`, then removes target directories the commits left empty.
///
/// Directories in `stop_at` are kept.
pub async fn rollback_and_prune(moves: &[PlannedMove], stop_at: &HashSet<PathBuf>) {
    rollback_all(moves).await;

    let parents: BTreeSet<PathBuf> = moves
        .iter()
        .filter_map(|m| m.target.parent().map(Path::to_path_buf))
        .collect();
    for parent in &parents {
        cleanup_empty_parents(parent, stop_at).await;
    }
}

/// Renames `source` straight to `target`, creating parent directories
pub async fn direct_rename(source: &Path, target: &Path) -> Result<()> {
    ensure_vacant(source, target, "move").await?;
    ensure_parent(source, target, "move").await?;
    move_with_fallback(source, target)
        .await
        .map_err(|e| LibraryError::move_failed("move", source, target, e))
}

/// Deletes empty directories from `from_dir` upwards.
///
/// Stops at the first non-empty directory and never removes a directory in
/// `stop_at`.
pub async fn cleanup_empty_parents(from_dir: &Path, stop_at: &HashSet<PathBuf>) {
    let mut current = Some(from_dir.to_path_buf());

    while let Some(dir) = current {
        if stop_at.contains(&dir) || !is_empty_dir(&dir).await {
            break;
        }
        if let Err(e) = fs::remove_dir(&dir).await {
            warn!("Could not remove empty directory {}: {}", dir.display(), e);
            break;
        }
        debug!("Removed empty directory {}", dir.display());
        current = dir.parent().map(Path::to_path_buf);
    }
}

async fn is_empty_dir(dir: &Path) -> bool {
    match fs::read_dir(dir).await {
        Ok(mut entries) => matches!(entries.next_entry().await, Ok(None)),
        Err(_) => false,
    }
}

/// Fails when `target` exists and is not `from` itself
async fn ensure_vacant(from: &Path, target: &Path, operation: &'static str) -> Result<()> {
    let taken = fs::try_exists(target)
        .await
        .map_err(|e| LibraryError::move_failed(operation, from, target, e))?;
    if taken && !same_file(from, target).await {
        return Err(LibraryError::move_failed(
            operation,
            from,
            target,
            io::Error::new(io::ErrorKind::AlreadyExists, "destination already exists"),
        ));
    }
    Ok(())
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a).await, fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

async fn ensure_parent(from: &Path, target: &Path, operation: &'static str) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| LibraryError::move_failed(operation, from, target, e))?;
    }
    Ok(())
}

/// Atomic rename, falling back to copy and remove when the rename is refused
async fn move_with_fallback(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if fs::metadata(from).await.is_err() {
                return Err(rename_err);
            }
            warn!(
                "Rename {} -> {} failed ({}), falling back to copy",
                from.display(),
                to.display(),
                rename_err
            );
            fs::copy(from, to).await?;
            fs::remove_file(from).await
        }
    }
}
