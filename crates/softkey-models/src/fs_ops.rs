//! Filesystem helpers shared by the store and the installer.
//!
//! - Atomic writes: temp file in the same directory, fsync, rename
//! - Best-effort deletes that report failure instead of raising it
//! - Directory moves that fall back to copy + delete across devices

use crate::error::{ModelStoreError, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// How a directory move was carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Single `rename(2)`; readers never observe a partial directory.
    Renamed,
    /// Recursive copy followed by deleting the source.
    Copied,
}

/// Create a directory and all parents.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| ModelStoreError::io_with_path(e, path))
}

/// Write `bytes` to `path` atomically.
///
/// The data goes to a temp file next to the target, is synced to disk and
/// then renamed over the target, so a crash leaves either the old or the new
/// contents but never a torn file.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    ensure_dir(parent)?;

    let mut temp =
        NamedTempFile::new_in(parent).map_err(|e| ModelStoreError::io_with_path(e, parent))?;
    temp.write_all(bytes)
        .map_err(|e| ModelStoreError::io_with_path(e, temp.path()))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| ModelStoreError::io_with_path(e, temp.path()))?;
    temp.persist(path)
        .map_err(|e| ModelStoreError::io_with_path(e.error, path))?;

    debug!("Atomically wrote {}", path.display());
    Ok(())
}

/// Delete a file, returning whether it is gone afterwards.
pub fn remove_file_best_effort(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to delete {}: {}", path.display(), e);
            false
        }
    }
}

/// Recursively delete a directory, returning whether it is gone afterwards.
pub fn remove_dir_best_effort(path: &Path) -> bool {
    match fs::remove_dir_all(path) {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!("Failed to delete directory {}: {}", path.display(), e);
            false
        }
    }
}

/// Recursively copy `src` into `dest`, creating `dest` if needed.
pub fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    ensure_dir(dest)?;
    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| ModelStoreError::Io {
                message: e.to_string(),
                path: Some(entry.path().to_path_buf()),
                source: None,
            })?;
        let target = dest.join(relative);

        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                ensure_dir(parent)?;
            }
            fs::copy(entry.path(), &target)
                .map_err(|e| ModelStoreError::io_with_path(e, &target))?;
        } else {
            debug!("Skipping non-regular entry {}", entry.path().display());
        }
    }
    Ok(())
}

/// Move a file or directory from `src` to `dest`.
///
/// `dest` must not exist. Tries an in-place rename first and falls back to
/// copy + delete-source when the rename fails (e.g. across devices). On a
/// failed copy the partial destination is removed before the error is
/// returned.
pub fn move_path(src: &Path, dest: &Path) -> Result<MoveOutcome> {
    match fs::rename(src, dest) {
        Ok(()) => return Ok(MoveOutcome::Renamed),
        Err(e) => debug!(
            "Rename {} -> {} failed, falling back to copy: {}",
            src.display(),
            dest.display(),
            e
        ),
    }

    let copied = if src.is_dir() {
        copy_dir_recursive(src, dest)
    } else {
        fs::copy(src, dest)
            .map(|_| ())
            .map_err(|e| ModelStoreError::io_with_path(e, dest))
    };

    if let Err(e) = copied {
        if dest.is_dir() {
            remove_dir_best_effort(dest);
        } else {
            remove_file_best_effort(dest);
        }
        return Err(e);
    }

    let source_removed = if src.is_dir() {
        remove_dir_best_effort(src)
    } else {
        remove_file_best_effort(src)
    };
    if !source_removed {
        warn!("Copied {} but could not remove the source", src.display());
    }
    Ok(MoveOutcome::Copied)
}

/// Size of a regular file, or `None` when it does not exist.
pub fn file_len(path: &Path) -> Option<u64> {
    fs::metadata(path)
        .ok()
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
}
