//! Zip extraction into a staging directory and manifest lookup.
//!
//! Entry names come from untrusted downloads. Every name is normalized and
//! checked against the canonical staging directory before anything is
//! written; entries that would land outside it are skipped.

use crate::cancel::CancellationToken;
use crate::config::LayoutConfig;
use crate::error::{ModelStoreError, Result};
use crate::fs_ops;
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// What [`extract_zip`] wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Files written, relative to the staging directory.
    pub files: Vec<PathBuf>,
    /// Entry names refused because they escape the staging directory.
    pub skipped: Vec<String>,
}

/// Normalize a zip entry name into a relative path.
///
/// Backslashes become forward slashes and leading slashes are stripped.
/// Returns `None` for names that are empty or still contain parent, root or
/// drive components after that.
pub fn sanitize_entry_name(name: &str) -> Option<PathBuf> {
    let normalized = name.replace('\\', "/");
    let trimmed = normalized.trim_start_matches('/');

    let mut relative = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    if relative.as_os_str().is_empty() {
        None
    } else {
        Some(relative)
    }
}

/// Whether `candidate` resolves inside `root`.
///
/// `root` must already be canonical. The deepest existing ancestor of
/// `candidate` is canonicalized so symlinked directories cannot redirect
/// writes.
fn is_contained(root: &Path, candidate: &Path) -> bool {
    let mut existing = candidate;
    let mut rest = Vec::new();
    while !existing.exists() {
        match (existing.file_name(), existing.parent()) {
            (Some(name), Some(parent)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return false,
        }
    }
    match existing.canonicalize() {
        Ok(mut resolved) => {
            for part in rest.iter().rev() {
                resolved.push(part);
            }
            resolved.starts_with(root)
        }
        Err(_) => false,
    }
}

/// Extract the zip at `archive_path` into `staging_dir`.
///
/// `staging_dir` must exist. Unsafe entries are skipped with a warning and
/// reported in the summary; they never touch the filesystem.
pub fn extract_zip(
    archive_path: &Path,
    staging_dir: &Path,
    cancel: &CancellationToken,
) -> Result<ExtractSummary> {
    let file =
        File::open(archive_path).map_err(|e| ModelStoreError::io_with_path(e, archive_path))?;
    let mut archive =
        zip::ZipArchive::new(BufReader::new(file)).map_err(|e| ModelStoreError::Archive {
            message: format!("Invalid zip archive {}: {}", archive_path.display(), e),
        })?;

    let root = staging_dir
        .canonicalize()
        .map_err(|e| ModelStoreError::io_with_path(e, staging_dir))?;
    let mut summary = ExtractSummary::default();

    for i in 0..archive.len() {
        cancel.check()?;
        let mut entry = archive.by_index(i).map_err(|e| ModelStoreError::Archive {
            message: format!("Failed to read zip entry {}: {}", i, e),
        })?;
        let name = entry.name().to_string();

        let relative = match sanitize_entry_name(&name) {
            Some(relative) => relative,
            None => {
                warn!("Skipping unsafe zip entry {:?}", name);
                summary.skipped.push(name);
                continue;
            }
        };
        let outpath = root.join(&relative);
        if !is_contained(&root, &outpath) {
            warn!("Skipping zip entry {:?} escaping the staging directory", name);
            summary.skipped.push(name);
            continue;
        }

        if entry.is_dir() {
            fs_ops::ensure_dir(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            fs_ops::ensure_dir(parent)?;
            // A previous entry may have planted a symlink on the way
            if !is_contained(&root, parent) {
                warn!("Skipping zip entry {:?} escaping the staging directory", name);
                summary.skipped.push(name);
                continue;
            }
        }

        let mut outfile =
            File::create(&outpath).map_err(|e| ModelStoreError::io_with_path(e, &outpath))?;
        io::copy(&mut entry, &mut outfile).map_err(|e| ModelStoreError::Archive {
            message: format!("Failed to extract {}: {}", name, e),
        })?;
        summary.files.push(relative);
    }

    debug!(
        "Extracted {} files from {} ({} skipped)",
        summary.files.len(),
        archive_path.display(),
        summary.skipped.len()
    );
    Ok(summary)
}

fn is_cruft(name: &str, is_dir: bool) -> bool {
    if is_dir {
        LayoutConfig::CRUFT_DIR_NAMES.contains(&name)
    } else {
        LayoutConfig::CRUFT_FILE_NAMES.contains(&name)
    }
}

/// Find `manifest.json` in the staging directory.
///
/// When it is not at the root but the root holds exactly one directory and
/// no files (archiver cruft aside) with a manifest inside, that directory's
/// contents are moved up one level first.
pub fn locate_manifest(staging_dir: &Path, model_id: &str) -> Result<PathBuf> {
    let manifest = staging_dir.join(LayoutConfig::MANIFEST_FILE_NAME);
    if manifest.is_file() {
        return Ok(manifest);
    }

    let mut subdirs = Vec::new();
    let mut cruft_dirs = Vec::new();
    let mut loose_files = false;
    let entries =
        fs::read_dir(staging_dir).map_err(|e| ModelStoreError::io_with_path(e, staging_dir))?;
    for entry in entries {
        let entry = entry.map_err(|e| ModelStoreError::io_with_path(e, staging_dir))?;
        let name = entry.file_name().to_string_lossy().to_string();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_cruft(&name, is_dir) {
            if is_dir {
                cruft_dirs.push(entry.path());
            }
            continue;
        }
        if is_dir {
            subdirs.push(entry.path());
        } else {
            loose_files = true;
        }
    }

    if let ([single], false) = (subdirs.as_slice(), loose_files) {
        if single.join(LayoutConfig::MANIFEST_FILE_NAME).is_file() {
            for cruft in &cruft_dirs {
                fs_ops::remove_dir_best_effort(cruft);
            }
            flatten(staging_dir, single)?;
            if manifest.is_file() {
                return Ok(manifest);
            }
        }
    }

    Err(ModelStoreError::ManifestNotFound {
        model_id: model_id.to_string(),
    })
}

/// Move the contents of `nested` into `staging_dir` and delete `nested`.
fn flatten(staging_dir: &Path, nested: &Path) -> Result<()> {
    // Park the directory under a name no child can collide with
    let parked = staging_dir.join(".flatten");
    fs::rename(nested, &parked).map_err(|e| ModelStoreError::io_with_path(e, nested))?;

    let children = fs::read_dir(&parked)
        .and_then(|entries| entries.collect::<io::Result<Vec<_>>>())
        .map_err(|e| ModelStoreError::io_with_path(e, &parked))?;

    for entry in children {
        let target = staging_dir.join(entry.file_name());
        if target.exists() {
            return Err(ModelStoreError::Archive {
                message: format!(
                    "Cannot flatten bundle: {} exists at both levels",
                    entry.file_name().to_string_lossy()
                ),
            });
        }
        fs_ops::move_path(&entry.path(), &target)?;
    }

    fs_ops::remove_dir_best_effort(&parked);
    debug!("Flattened nested bundle directory {}", nested.display());
    Ok(())
}
