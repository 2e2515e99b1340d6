//! Bundle download, verification, extraction and promotion.
//!
//! Install sequence for one catalog entry:
//! 1. Stream the bundle into `.downloads/` while hashing it
//! 2. Compare against the catalog's bundle hash
//! 3. Extract into `<id>-staging/` (cleared first)
//! 4. Locate (and if needed flatten) `manifest.json`
//! 5. Check every declared file, hashing those with a declared sha256
//! 6. Check the manifest declares the catalog id, then promote staging to
//!    `<id>/`, keeping `<id>-previous/` until the new directory is in place
//!
//! Any failure leaves the previously installed model untouched, and the
//! staging directory is removed on every exit path.

use super::archive;
use super::hashing;
use super::integrity::IntegrityVerifier;
use super::manifest;
use super::pending::PendingDeletions;
use super::selection::SelectionStore;
use super::types::{CatalogEntry, ModelDefinition};
use crate::cancel::CancellationToken;
use crate::config::LayoutConfig;
use crate::error::{ModelStoreError, Result};
use crate::fs_ops::{self, MoveOutcome};
use crate::network::StreamProvider;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Removes the staging directory when dropped.
struct StagingGuard<'a> {
    name: String,
    path: PathBuf,
    pending: &'a PendingDeletions,
}

impl<'a> StagingGuard<'a> {
    /// Clear any leftover staging directory and create a fresh one.
    fn create(models_root: &Path, model_id: &str, pending: &'a PendingDeletions) -> Result<Self> {
        let name = format!("{}{}", model_id, LayoutConfig::STAGING_SUFFIX);
        let path = models_root.join(&name);
        if path.exists() && !fs_ops::remove_dir_best_effort(&path) {
            return Err(ModelStoreError::Io {
                message: "Failed to clear stale staging directory".to_string(),
                path: Some(path),
                source: None,
            });
        }
        fs_ops::ensure_dir(&path)?;
        Ok(Self {
            name,
            path,
            pending,
        })
    }
}

impl Drop for StagingGuard<'_> {
    fn drop(&mut self) {
        if self.path.exists() {
            self.pending.delete_or_defer(&self.name);
        }
    }
}

/// Downloads and installs catalog bundles under a models root.
pub struct ArchiveInstaller {
    models_root: PathBuf,
    downloads_dir: PathBuf,
    transport: Arc<dyn StreamProvider>,
    verifier: IntegrityVerifier,
    selection: SelectionStore,
    pending: PendingDeletions,
}

impl ArchiveInstaller {
    pub fn new(
        models_root: impl Into<PathBuf>,
        downloads_dir: impl Into<PathBuf>,
        transport: Arc<dyn StreamProvider>,
        verifier: IntegrityVerifier,
        selection: SelectionStore,
    ) -> Self {
        let models_root = models_root.into();
        let pending = PendingDeletions::new(&models_root);
        Self {
            models_root,
            downloads_dir: downloads_dir.into(),
            transport,
            verifier,
            selection,
            pending,
        }
    }

    /// Download, verify and install `entry`. Returns the installed manifest.
    pub fn install(
        &self,
        entry: &CatalogEntry,
        cancel: &CancellationToken,
    ) -> Result<ModelDefinition> {
        let requested_id = entry.definition.id();
        info!("Installing {} from {}", requested_id, entry.bundle_url);

        fs_ops::ensure_dir(&self.downloads_dir)?;
        let mut bundle = tempfile::Builder::new()
            .prefix(LayoutConfig::DOWNLOAD_TEMP_PREFIX)
            .suffix(LayoutConfig::DOWNLOAD_TEMP_SUFFIX)
            .tempfile_in(&self.downloads_dir)
            .map_err(|e| ModelStoreError::io_with_path(e, &self.downloads_dir))?;

        let digest = {
            let mut reader = self.transport.open(&entry.bundle_url)?;
            hashing::copy_hashing(&mut reader, bundle.as_file_mut(), cancel)?
        };
        debug!(
            "Downloaded {} bytes for {} (sha256 {})",
            digest.bytes, requested_id, digest.sha256
        );

        if let Some(expected_size) = entry.bundle_size_bytes {
            if expected_size != digest.bytes {
                warn!(
                    "Bundle for {} is {} bytes, catalog declared {}",
                    requested_id, digest.bytes, expected_size
                );
            }
        }

        if !entry.bundle_sha256.trim().is_empty()
            && !hashing::digests_match(&entry.bundle_sha256, &digest.sha256)
        {
            return Err(ModelStoreError::HashMismatch {
                subject: format!("bundle {}", requested_id),
                expected: entry.bundle_sha256.clone(),
                actual: digest.sha256,
            });
        }

        cancel.check()?;
        let staging = StagingGuard::create(&self.models_root, requested_id, &self.pending)?;
        let summary = archive::extract_zip(bundle.path(), &staging.path, cancel)?;
        if !summary.skipped.is_empty() {
            warn!(
                "Bundle for {} contained {} unsafe entries, skipped",
                requested_id,
                summary.skipped.len()
            );
        }

        let manifest_path = archive::locate_manifest(&staging.path, requested_id)?;
        let definition = manifest::read_manifest(&manifest_path)?;
        // The caller locked and named `requested_id`; never replace another model
        if definition.id() != requested_id {
            return Err(ModelStoreError::validation(
                "id",
                format!(
                    "bundle for {} declares model id {}",
                    requested_id,
                    definition.id()
                ),
            ));
        }

        let verified = self.verify_payload(&staging.path, &definition)?;

        cancel.check()?;
        self.promote(&staging.path, definition.id())?;
        drop(staging);
        drop(bundle);

        self.seed_digests(&definition, &verified);

        match self.selection.get(definition.engine_type()) {
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(e) = self.selection.set(definition.engine_type(), definition.id()) {
                    warn!("Failed to select {}: {}", definition.id(), e);
                }
            }
            Err(e) => warn!("Failed to read selection for {}: {}", definition.engine_type(), e),
        }

        info!("Installed model {}", definition.id());
        Ok(definition)
    }

    /// Every declared file must exist and be non-empty; declared hashes
    /// must match. Returns the verified `(filename, sha256)` pairs.
    fn verify_payload(
        &self,
        staging_dir: &Path,
        definition: &ModelDefinition,
    ) -> Result<Vec<(String, String)>> {
        let mut verified = Vec::new();
        for (_, requirement) in definition.requirements() {
            let path = staging_dir.join(&requirement.filename);
            match fs_ops::file_len(&path) {
                Some(len) if len > 0 => {}
                _ => {
                    return Err(ModelStoreError::MissingFile {
                        model_id: definition.id().to_string(),
                        filename: requirement.filename.clone(),
                    })
                }
            }

            if let Some(expected) = requirement.sha256.as_deref() {
                let actual = hashing::sha256_file(&path)?;
                if !hashing::digests_match(expected, &actual) {
                    return Err(ModelStoreError::HashMismatch {
                        subject: format!("{}/{}", definition.id(), requirement.filename),
                        expected: expected.to_string(),
                        actual,
                    });
                }
                verified.push((requirement.filename.clone(), actual));
            }
        }
        Ok(verified)
    }

    /// Replace `<models-root>/<model_id>` with the staging directory.
    fn promote(&self, staging_dir: &Path, model_id: &str) -> Result<()> {
        let target = self.models_root.join(model_id);
        let backup_name = format!("{}{}", model_id, LayoutConfig::PREVIOUS_SUFFIX);
        let backup = self.models_root.join(&backup_name);

        // A reinstalled id must not be swept at the next start
        self.pending.forget(model_id)?;

        if backup.exists() && !fs_ops::remove_dir_best_effort(&backup) {
            return Err(ModelStoreError::Io {
                message: "Failed to clear previous backup directory".to_string(),
                path: Some(backup),
                source: None,
            });
        }

        let backed_up = if target.exists() {
            match fs::rename(&target, &backup) {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        "Could not move {} aside ({}), deleting it instead",
                        target.display(),
                        e
                    );
                    if !fs_ops::remove_dir_best_effort(&target) {
                        return Err(ModelStoreError::Io {
                            message: "Failed to remove the installed model directory".to_string(),
                            path: Some(target),
                            source: Some(e),
                        });
                    }
                    false
                }
            }
        } else {
            false
        };

        match fs_ops::move_path(staging_dir, &target) {
            Ok(outcome) => {
                if outcome == MoveOutcome::Copied {
                    debug!("Promoted {} by copy", model_id);
                }
                if backed_up {
                    self.pending.delete_or_defer(&backup_name);
                }
                Ok(())
            }
            Err(e) => {
                if backed_up {
                    if let Err(restore) = fs::rename(&backup, &target) {
                        warn!(
                            "Failed to restore {} from {}: {}",
                            target.display(),
                            backup.display(),
                            restore
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn seed_digests(&self, definition: &ModelDefinition, verified: &[(String, String)]) {
        let cache = self.verifier.cache();
        if let Err(e) = cache.purge_model(definition.id()) {
            warn!("Failed to purge digests for {}: {}", definition.id(), e);
        }
        for (filename, sha256) in verified {
            if let Err(e) = cache.put(definition.id(), filename, sha256) {
                warn!("Failed to cache digest for {}/{}: {}", definition.id(), filename, e);
            }
        }
    }
}
