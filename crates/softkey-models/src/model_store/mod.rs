//! Prediction-model package store.
//!
//! Discovers models installed under a models root, verifies their files
//! against manifest hashes, stages bundled models out of the application
//! assets, installs downloaded bundles and remembers the selected model per
//! engine type.

pub mod archive;
pub mod assets;
mod builder;
pub mod catalog;
pub mod hashing;
pub mod integrity;
mod installer;
pub mod lock;
pub mod manifest;
mod pending;
pub mod selection;
mod store;
pub mod types;

pub use assets::{AssetSource, DirectoryAssetSource, NoAssets};
pub use builder::ModelStoreBuilder;
pub use catalog::{fetch_catalog, parse_catalog};
pub use installer::ArchiveInstaller;
pub use integrity::{DigestCache, IntegrityVerifier, Verification};
pub use lock::ModelLock;
pub use manifest::BUILTIN_MODEL_ID;
pub use pending::PendingDeletions;
pub use selection::SelectionStore;
pub use store::ModelStore;
pub use types::{
    file_types, ActiveModel, CatalogEntry, EngineType, FileRequirement, ModelDefinition,
    ModelDefinitionBuilder,
};
