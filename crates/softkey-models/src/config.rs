//! Centralized configuration for the model store.
//!
//! On-disk layout names, network timeouts and durable-state key names live
//! here so that the store, the installer and the CLI agree on them.

use std::time::Duration;

/// Names of files and directories under the models root.
pub struct LayoutConfig;

impl LayoutConfig {
    pub const MANIFEST_FILE_NAME: &'static str = "manifest.json";
    pub const STAGING_SUFFIX: &'static str = "-staging";
    pub const PREVIOUS_SUFFIX: &'static str = "-previous";
    pub const DOWNLOADS_DIR_NAME: &'static str = ".downloads";
    pub const LOCKS_DIR_NAME: &'static str = ".locks";
    pub const PENDING_DELETIONS_FILE_NAME: &'static str = ".pending-deletions.json";
    pub const DOWNLOAD_TEMP_PREFIX: &'static str = "bundle_";
    pub const DOWNLOAD_TEMP_SUFFIX: &'static str = ".zip";
    /// Directories archivers add next to the payload.
    pub const CRUFT_DIR_NAMES: &'static [&'static str] = &["__MACOSX"];
    /// Files archivers add next to the payload.
    pub const CRUFT_FILE_NAMES: &'static [&'static str] = &[".DS_Store", "Thumbs.db"];
}

/// Streaming and hashing parameters.
pub struct HashingConfig;

impl HashingConfig {
    /// Read buffer for hashing files on disk.
    pub const CHUNK_SIZE: usize = 256 * 1024;
    /// Read buffer for network downloads and asset copies.
    pub const STREAM_CHUNK_SIZE: usize = 32 * 1024;
}

/// Network-related configuration for the bundled transports.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
    /// Whole-request ceiling; bundles can be hundreds of megabytes.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30 * 60);
    pub const USER_AGENT: &'static str = concat!("softkey-models/", env!("CARGO_PKG_VERSION"));
    pub const ACCEPT: &'static str = "application/json, application/zip, */*";
    pub const ACCEPT_ENCODING: &'static str = "identity";
    pub const MAX_REDIRECTS: usize = 10;
}

/// Namespaces and keys used in the durable key-value store.
pub struct StateConfig;

impl StateConfig {
    pub const DIGEST_NAMESPACE: &'static str = "digests";
    pub const SELECTION_NAMESPACE: &'static str = "selection";
    pub const SELECTION_KEY_PREFIX: &'static str = "selected_model_id_";
}
