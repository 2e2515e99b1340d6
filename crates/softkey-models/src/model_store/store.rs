//! Model store orchestrator: discovery, activation, removal and installs.

use super::assets::{self, AssetSource};
use super::builder::ModelStoreBuilder;
use super::catalog;
use super::hashing;
use super::installer::ArchiveInstaller;
use super::integrity::IntegrityVerifier;
use super::manifest::{self, BUILTIN_MODEL_ID};
use super::pending::PendingDeletions;
use super::selection::SelectionStore;
use super::types::{validate_path_component, ActiveModel, CatalogEntry, EngineType, ModelDefinition};
use crate::cancel::CancellationToken;
use crate::config::LayoutConfig;
use crate::error::{ModelStoreError, Result};
use crate::fs_ops;
use crate::network::StreamProvider;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Local store of installable prediction models.
///
/// Layout: `<models-root>/<id>/manifest.json` plus one file per requirement.
/// All operations are blocking; callers serialize mutations of the same
/// model id (see [`ModelLock`](super::lock::ModelLock)).
pub struct ModelStore {
    models_root: PathBuf,
    assets: Arc<dyn AssetSource>,
    verifier: IntegrityVerifier,
    selection: SelectionStore,
    pending: PendingDeletions,
    installer: ArchiveInstaller,
    transport: Arc<dyn StreamProvider>,
}

impl ModelStore {
    pub fn builder(models_root: impl Into<PathBuf>) -> ModelStoreBuilder {
        ModelStoreBuilder::new(models_root)
    }

    pub(crate) fn from_parts(
        models_root: PathBuf,
        assets: Arc<dyn AssetSource>,
        verifier: IntegrityVerifier,
        selection: SelectionStore,
        pending: PendingDeletions,
        installer: ArchiveInstaller,
        transport: Arc<dyn StreamProvider>,
    ) -> Self {
        Self {
            models_root,
            assets,
            verifier,
            selection,
            pending,
            installer,
            transport,
        }
    }

    pub fn models_root(&self) -> &Path {
        &self.models_root
    }

    pub fn verifier(&self) -> &IntegrityVerifier {
        &self.verifier
    }

    // ========================================
    // Discovery
    // ========================================

    /// Every discoverable definition: on-disk manifests in directory name
    /// order, then the built-in default if its assets are bundled.
    ///
    /// Unreadable or invalid manifests, and manifests whose id is not the
    /// name of their directory, are logged and skipped.
    pub fn discover_definitions(&self) -> Vec<ModelDefinition> {
        let mut definitions: Vec<ModelDefinition> = Vec::new();

        for dir_name in self.candidate_directories() {
            let manifest_path = self
                .models_root
                .join(&dir_name)
                .join(LayoutConfig::MANIFEST_FILE_NAME);
            if !manifest_path.is_file() {
                debug!("Skipping {}: no manifest", dir_name);
                continue;
            }

            let definition = match manifest::read_manifest(&manifest_path) {
                Ok(definition) => definition,
                Err(e) => {
                    warn!("Skipping model manifest {}: {}", manifest_path.display(), e);
                    continue;
                }
            };

            if definition.id() != dir_name {
                warn!(
                    "Skipping model manifest {}: declares id {}",
                    manifest_path.display(),
                    definition.id()
                );
                continue;
            }
            if definitions.iter().any(|d| d.id() == definition.id()) {
                warn!(
                    "Duplicate model id {} in {}, keeping the first",
                    definition.id(),
                    dir_name
                );
                continue;
            }
            definitions.push(definition);
        }

        if !definitions.iter().any(|d| d.id() == BUILTIN_MODEL_ID) {
            let builtin = manifest::builtin_default();
            if self.assets_bundled(&builtin) {
                definitions.push(builtin);
            }
        }

        definitions
    }

    /// Alias of [`discover_definitions`](Self::discover_definitions) for UI listings.
    pub fn list_available_models(&self) -> Vec<ModelDefinition> {
        self.discover_definitions()
    }

    fn candidate_directories(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.models_root) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot list {}: {}", self.models_root.display(), e);
                return Vec::new();
            }
        };
        let pending = self.pending.load();

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| {
                !name.starts_with('.')
                    && !name.ends_with(LayoutConfig::STAGING_SUFFIX)
                    && !name.ends_with(LayoutConfig::PREVIOUS_SUFFIX)
                    && !pending.contains(name)
            })
            .collect();
        names.sort();
        names
    }

    fn assets_bundled(&self, definition: &ModelDefinition) -> bool {
        definition.requirements().all(|(_, requirement)| {
            requirement
                .asset_path
                .as_deref()
                .map(|path| self.assets.exists(path))
                .unwrap_or(false)
        })
    }

    // ========================================
    // Activation
    // ========================================

    /// Resolve, install and verify the model to use for `engine_type`.
    ///
    /// Tries the selected model (or the built-in default for n-gram), then
    /// every other discovered model of that engine type in order. The first
    /// one that installs becomes the selection. `None` means no usable model.
    pub fn ensure_active_model(&self, engine_type: EngineType) -> Option<ActiveModel> {
        let candidates: Vec<ModelDefinition> = self
            .discover_definitions()
            .into_iter()
            .filter(|d| d.engine_type() == engine_type)
            .collect();
        if candidates.is_empty() {
            warn!("No {} models discovered; predictions unavailable", engine_type);
            return None;
        }

        let selected = match self.selection.get(engine_type) {
            Ok(selected) => selected,
            Err(e) => {
                warn!("Failed to read {} selection: {}", engine_type, e);
                None
            }
        };
        let preferred = selected.or_else(|| match engine_type {
            EngineType::Ngram => Some(BUILTIN_MODEL_ID.to_string()),
            EngineType::Neural => None,
        });

        let first = preferred
            .as_deref()
            .and_then(|id| candidates.iter().position(|d| d.id() == id))
            .unwrap_or(0);
        let order = std::iter::once(first).chain((0..candidates.len()).filter(|i| *i != first));

        for index in order {
            let candidate = &candidates[index];
            match self.ensure_definition_installed(candidate) {
                Ok(active) => {
                    if let Err(e) = self.selection.set(engine_type, candidate.id()) {
                        warn!("Failed to persist selection {}: {}", candidate.id(), e);
                    }
                    return Some(active);
                }
                Err(e) => warn!(
                    "Failed to stage model {}: {}; trying the next candidate",
                    candidate.id(),
                    e
                ),
            }
        }

        warn!("No usable {} model", engine_type);
        None
    }

    /// Make sure every file of `definition` is present and valid.
    ///
    /// Invalid files are deleted and restaged from bundled assets when
    /// possible. Nothing is downloaded. Writes `manifest.json` only if the
    /// model directory has none.
    pub fn ensure_definition_installed(&self, definition: &ModelDefinition) -> Result<ActiveModel> {
        let model_dir = self.models_root.join(definition.id());

        let mut files = Vec::with_capacity(definition.requirement_count());
        for (file_type, requirement) in definition.requirements() {
            let destination = model_dir.join(&requirement.filename);

            if destination.exists() {
                if self.verifier.is_valid(definition, requirement, &destination) {
                    files.push((file_type.to_string(), destination));
                    continue;
                }
                self.discard(definition, &requirement.filename, &destination);
            }

            if assets::stage_from_asset(self.assets.as_ref(), &destination, requirement) {
                if self.verifier.is_valid(definition, requirement, &destination) {
                    files.push((file_type.to_string(), destination));
                    continue;
                }
                let expected = match requirement.sha256.clone() {
                    Some(expected) => expected,
                    None => {
                        self.discard(definition, &requirement.filename, &destination);
                        return Err(ModelStoreError::MissingFile {
                            model_id: definition.id().to_string(),
                            filename: requirement.filename.clone(),
                        });
                    }
                };
                let actual = hashing::sha256_file(&destination)
                    .unwrap_or_else(|_| "unreadable".to_string());
                self.discard(definition, &requirement.filename, &destination);
                return Err(ModelStoreError::HashMismatch {
                    subject: format!("{}/{}", definition.id(), requirement.filename),
                    expected,
                    actual,
                });
            }

            return Err(ModelStoreError::MissingFile {
                model_id: definition.id().to_string(),
                filename: requirement.filename.clone(),
            });
        }

        let manifest_path = model_dir.join(LayoutConfig::MANIFEST_FILE_NAME);
        if !manifest_path.exists() {
            manifest::write_manifest(&manifest_path, definition)?;
            debug!("Wrote manifest for {}", definition.id());
        }

        Ok(ActiveModel::new(definition.clone(), model_dir, files))
    }

    fn discard(&self, definition: &ModelDefinition, filename: &str, path: &Path) {
        fs_ops::remove_file_best_effort(path);
        self.verifier.forget_quietly(definition.id(), filename);
    }

    // ========================================
    // Removal
    // ========================================

    /// Delete a model directory, its cached digests and any selection of it.
    ///
    /// A failed delete is deferred to the next start instead of failing.
    pub fn remove_model(&self, model_id: &str) -> Result<()> {
        validate_path_component("id", model_id)?;

        if self.pending.delete_or_defer(model_id) {
            info!("Removed model {}", model_id);
        } else {
            warn!("Model {} will be deleted at next start", model_id);
        }

        let purged = self.verifier.cache().purge_model(model_id)?;
        debug!("Purged {} digests of {}", purged, model_id);

        for engine_type in EngineType::ALL {
            if self.selection.get(engine_type)?.as_deref() == Some(model_id) {
                self.selection.clear(engine_type)?;
            }
        }
        Ok(())
    }

    // ========================================
    // Downloads
    // ========================================

    /// Download and install a catalog bundle.
    pub fn download_and_install(&self, entry: &CatalogEntry) -> Result<ModelDefinition> {
        self.download_and_install_with_cancel(entry, &CancellationToken::new())
    }

    /// Download and install a catalog bundle, aborting when `cancel` fires.
    pub fn download_and_install_with_cancel(
        &self,
        entry: &CatalogEntry,
        cancel: &CancellationToken,
    ) -> Result<ModelDefinition> {
        self.installer.install(entry, cancel)
    }

    /// Fetch and parse a remote catalog through the store's transport.
    pub fn fetch_catalog(&self, url: &str) -> Result<Vec<CatalogEntry>> {
        catalog::fetch_catalog(self.transport.as_ref(), url)
    }

    // ========================================
    // Selection
    // ========================================

    pub fn persist_selected_model_id(&self, engine_type: EngineType, model_id: &str) -> Result<()> {
        self.selection.set(engine_type, model_id)
    }

    pub fn get_selected_model_id(&self, engine_type: EngineType) -> Result<Option<String>> {
        self.selection.get(engine_type)
    }

    pub fn clear_selected_model_id(&self, engine_type: EngineType) -> Result<()> {
        self.selection.clear(engine_type)
    }
}
