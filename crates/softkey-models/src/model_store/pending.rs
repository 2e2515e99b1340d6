//! Journal of model directories whose deletion failed.
//!
//! Deleting a directory can fail on flaky or read-only storage. Instead of
//! surfacing that, the directory name is recorded here and the deletion is
//! retried the next time a store is built.

use super::types::validate_path_component;
use crate::config::LayoutConfig;
use crate::error::Result;
use crate::fs_ops;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Default, Serialize, Deserialize)]
struct JournalFile {
    #[serde(default)]
    directories: BTreeSet<String>,
}

/// `<models-root>/.pending-deletions.json`.
#[derive(Debug, Clone)]
pub struct PendingDeletions {
    models_root: PathBuf,
    path: PathBuf,
}

impl PendingDeletions {
    pub fn new(models_root: impl Into<PathBuf>) -> Self {
        let models_root = models_root.into();
        let path = models_root.join(LayoutConfig::PENDING_DELETIONS_FILE_NAME);
        Self { models_root, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory names awaiting deletion. A missing or unreadable journal
    /// is treated as empty.
    pub fn load(&self) -> BTreeSet<String> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return BTreeSet::new(),
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                return BTreeSet::new();
            }
        };
        match serde_json::from_slice::<JournalFile>(&bytes) {
            Ok(journal) => journal
                .directories
                .into_iter()
                .filter(|name| validate_path_component("directory", name).is_ok())
                .collect(),
            Err(e) => {
                warn!("Ignoring corrupt {}: {}", self.path.display(), e);
                BTreeSet::new()
            }
        }
    }

    fn save(&self, directories: BTreeSet<String>) -> Result<()> {
        if directories.is_empty() {
            fs_ops::remove_file_best_effort(&self.path);
            return Ok(());
        }
        let bytes = serde_json::to_vec_pretty(&JournalFile { directories })?;
        fs_ops::atomic_write(&self.path, &bytes)
    }

    /// Remember that `name` still has to be deleted.
    pub fn record(&self, name: &str) -> Result<()> {
        let mut directories = self.load();
        if directories.insert(name.to_string()) {
            self.save(directories)?;
            info!("Deletion of {} deferred to next start", name);
        }
        Ok(())
    }

    /// Forget `name`, e.g. because it was reinstalled.
    pub fn forget(&self, name: &str) -> Result<()> {
        let mut directories = self.load();
        if directories.remove(name) {
            self.save(directories)?;
        }
        Ok(())
    }

    /// Delete `name` under the models root, recording it on failure.
    ///
    /// Returns whether the directory is gone. Never fails.
    pub fn delete_or_defer(&self, name: &str) -> bool {
        let dir = self.models_root.join(name);
        if fs_ops::remove_dir_best_effort(&dir) {
            return true;
        }
        if let Err(e) = self.record(name) {
            warn!("Failed to record pending deletion of {}: {}", name, e);
        }
        false
    }

    /// Retry every recorded deletion, keeping only those that still fail.
    /// Returns how many directories were deleted.
    pub fn sweep(&self) -> usize {
        let pending = self.load();
        if pending.is_empty() {
            return 0;
        }

        let mut remaining = BTreeSet::new();
        let mut deleted = 0;
        for name in pending {
            if fs_ops::remove_dir_best_effort(&self.models_root.join(&name)) {
                debug!("Deleted pending directory {}", name);
                deleted += 1;
            } else {
                remaining.insert(name);
            }
        }

        if let Err(e) = self.save(remaining) {
            warn!("Failed to update {}: {}", self.path.display(), e);
        }
        deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_record_forget_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let journal = PendingDeletions::new(temp_dir.path());

        journal.record("en").unwrap();
        journal.record("de").unwrap();
        assert_eq!(
            journal.load().into_iter().collect::<Vec<_>>(),
            vec!["de".to_string(), "en".to_string()]
        );

        journal.forget("en").unwrap();
        journal.forget("de").unwrap();
        assert!(journal.load().is_empty());
        assert!(!journal.path().exists());
    }

    #[test]
    fn test_sweep_deletes_recorded_directories() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir_all(temp_dir.path().join("old").join("inner")).unwrap();
        let journal = PendingDeletions::new(temp_dir.path());
        journal.record("old").unwrap();
        journal.record("already-gone").unwrap();

        assert_eq!(journal.sweep(), 2);
        assert!(!temp_dir.path().join("old").exists());
        assert!(journal.load().is_empty());
    }

    #[test]
    fn test_unsafe_and_corrupt_entries_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let journal = PendingDeletions::new(temp_dir.path());

        std::fs::write(journal.path(), br#"{"directories": ["../outside", "ok"]}"#).unwrap();
        assert_eq!(journal.load().into_iter().collect::<Vec<_>>(), vec!["ok"]);

        std::fs::write(journal.path(), b"garbage").unwrap();
        assert!(journal.load().is_empty());
    }
}
