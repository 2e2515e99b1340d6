//! Builder for configuring a [`ModelStore`].

use super::assets::{AssetSource, DirectoryAssetSource, NoAssets};
use super::installer::ArchiveInstaller;
use super::integrity::{DigestCache, IntegrityVerifier};
use super::pending::PendingDeletions;
use super::selection::SelectionStore;
use super::store::ModelStore;
use crate::config::LayoutConfig;
use crate::error::{ModelStoreError, Result};
use crate::fs_ops;
use crate::kv::{KeyValueStore, MemoryKeyValueStore};
use crate::network::{DefaultStreamProvider, StreamProvider};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Builder for [`ModelStore`].
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use softkey_models::{ModelStore, SqliteKeyValueStore};
///
/// let store = ModelStore::builder("/data/models")
///     .asset_dir("/app/assets")
///     .key_value_store(Arc::new(SqliteKeyValueStore::open("/data/state.sqlite")?))
///     .build()?;
/// ```
pub struct ModelStoreBuilder {
    models_root: PathBuf,
    create_root: bool,
    assets: Option<Arc<dyn AssetSource>>,
    kv: Option<Arc<dyn KeyValueStore>>,
    transport: Option<Arc<dyn StreamProvider>>,
    downloads_dir: Option<PathBuf>,
}

impl ModelStoreBuilder {
    pub fn new(models_root: impl Into<PathBuf>) -> Self {
        Self {
            models_root: models_root.into(),
            create_root: true,
            assets: None,
            kv: None,
            transport: None,
            downloads_dir: None,
        }
    }

    /// Create the models root if it does not exist.
    ///
    /// Default: `true`
    pub fn create_root(mut self, enable: bool) -> Self {
        self.create_root = enable;
        self
    }

    /// Bundled read-only assets. Default: none.
    pub fn assets(mut self, assets: Arc<dyn AssetSource>) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Bundled assets laid out under a directory.
    pub fn asset_dir(self, dir: impl Into<PathBuf>) -> Self {
        self.assets(Arc::new(DirectoryAssetSource::new(dir)))
    }

    /// Durable state for digests and selections.
    ///
    /// Default: an in-memory store, so nothing survives the process.
    pub fn key_value_store(mut self, kv: Arc<dyn KeyValueStore>) -> Self {
        self.kv = Some(kv);
        self
    }

    /// Transport used for bundles and catalogs. Default: HTTP(S) and files.
    pub fn transport(mut self, transport: Arc<dyn StreamProvider>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Where bundles are buffered while downloading.
    ///
    /// Default: `<models-root>/.downloads`
    pub fn downloads_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.downloads_dir = Some(dir.into());
        self
    }

    /// Build the store, retrying any deletions deferred by a previous run.
    pub fn build(self) -> Result<ModelStore> {
        if !self.models_root.is_dir() {
            if self.create_root {
                fs_ops::ensure_dir(&self.models_root)?;
            } else {
                return Err(ModelStoreError::Io {
                    message: "Models root does not exist".to_string(),
                    path: Some(self.models_root),
                    source: None,
                });
            }
        }

        let transport: Arc<dyn StreamProvider> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(DefaultStreamProvider::new()?),
        };
        let kv = self
            .kv
            .unwrap_or_else(|| Arc::new(MemoryKeyValueStore::new()));
        let assets = self.assets.unwrap_or_else(|| Arc::new(NoAssets));
        let downloads_dir = self
            .downloads_dir
            .unwrap_or_else(|| self.models_root.join(LayoutConfig::DOWNLOADS_DIR_NAME));

        let pending = PendingDeletions::new(&self.models_root);
        let swept = pending.sweep();
        if swept > 0 {
            info!("Deleted {} model directories left over from a previous run", swept);
        }

        let verifier = IntegrityVerifier::new(DigestCache::new(kv.clone()));
        let selection = SelectionStore::new(kv);
        let installer = ArchiveInstaller::new(
            &self.models_root,
            downloads_dir,
            transport.clone(),
            verifier.clone(),
            selection.clone(),
        );

        Ok(ModelStore::from_parts(
            self.models_root,
            assets,
            verifier,
            selection,
            pending,
            installer,
            transport,
        ))
    }
}
