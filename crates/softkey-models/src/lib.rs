//! Softkey Models - on-device prediction-model package store.
//!
//! Discovers, verifies, installs and selects the language-model bundles
//! used by the keyboard's prediction engines: n-gram ARPA + vocabulary
//! pairs, or neural weights + tokenizer triples.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use softkey_models::{EngineType, ModelStore, SqliteKeyValueStore};
//!
//! fn main() -> softkey_models::Result<()> {
//!     let store = ModelStore::builder("/data/models")
//!         .asset_dir("/app/assets")
//!         .key_value_store(Arc::new(SqliteKeyValueStore::open("/data/state.sqlite")?))
//!         .build()?;
//!
//!     // Activate whatever n-gram model is usable
//!     match store.ensure_active_model(EngineType::Ngram) {
//!         Some(active) => println!("Using {}", active.directory().display()),
//!         None => println!("Predictions unavailable"),
//!     }
//!
//!     // Install a bundle from a catalog
//!     for entry in store.fetch_catalog("https://example.com/catalog.json")? {
//!         if entry.recommended {
//!             store.download_and_install(&entry)?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod fs_ops;
pub mod kv;
pub mod model_store;
pub mod network;

// Re-export commonly used types
pub use cancel::CancellationToken;
pub use error::{ErrorKind, ModelStoreError, Result};
pub use kv::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use model_store::{
    ActiveModel, AssetSource, CatalogEntry, DirectoryAssetSource, EngineType, FileRequirement,
    ModelDefinition, ModelLock, ModelStore, ModelStoreBuilder, NoAssets, BUILTIN_MODEL_ID,
};
pub use network::{DefaultStreamProvider, FileStreamProvider, HttpStreamProvider, StreamProvider};
