//! Advisory per-model file locks.
//!
//! The store does not serialize mutations of the same model id itself.
//! Callers that may race (a settings screen and a background activation,
//! two CLI invocations) hold a [`ModelLock`] around installs and removals.

use super::types::validate_path_component;
use crate::config::LayoutConfig;
use crate::error::{ModelStoreError, Result};
use crate::fs_ops;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Exclusive lock on `<models-root>/.locks/<id>.lock`, released on drop.
#[derive(Debug)]
pub struct ModelLock {
    file: File,
    path: PathBuf,
}

impl ModelLock {
    fn open(models_root: &Path, model_id: &str) -> Result<(File, PathBuf)> {
        validate_path_component("id", model_id)?;
        let dir = models_root.join(LayoutConfig::LOCKS_DIR_NAME);
        fs_ops::ensure_dir(&dir)?;
        let path = dir.join(format!("{}.lock", model_id));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| ModelStoreError::io_with_path(e, &path))?;
        Ok((file, path))
    }

    /// Block until the lock for `model_id` is held.
    pub fn acquire(models_root: &Path, model_id: &str) -> Result<Self> {
        let (file, path) = Self::open(models_root, model_id)?;
        file.lock_exclusive()
            .map_err(|e| ModelStoreError::io_with_path(e, &path))?;
        debug!("Acquired model lock {}", path.display());
        Ok(Self { file, path })
    }

    /// Take the lock if it is free, `Ok(None)` if someone else holds it.
    pub fn try_acquire(models_root: &Path, model_id: &str) -> Result<Option<Self>> {
        let (file, path) = Self::open(models_root, model_id)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => Err(ModelStoreError::io_with_path(e, &path)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ModelLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release {}: {}", self.path.display(), e);
        }
    }
}
