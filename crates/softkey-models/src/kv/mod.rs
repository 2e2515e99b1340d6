//! Durable string-keyed state for the digest cache and model selection.
//!
//! Both consumers share one backend and are isolated by namespace:
//! - `digests`: last verified SHA-256 per installed file
//! - `selection`: selected model id per engine type

mod memory;
mod sqlite;
mod traits;

pub use memory::MemoryKeyValueStore;
pub use sqlite::SqliteKeyValueStore;
pub use traits::KeyValueStore;
