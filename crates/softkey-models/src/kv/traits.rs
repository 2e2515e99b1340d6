//! Key-value backend trait.

use crate::error::Result;

/// Namespace-isolated string map.
///
/// Each individual call must be atomic; multi-step sequences built on top
/// of it are not transactional. Implementations are shared across threads.
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`, if any.
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Returns whether a value was present.
    fn remove(&self, namespace: &str, key: &str) -> Result<bool>;

    /// All keys currently stored in `namespace`, in ascending order.
    fn keys(&self, namespace: &str) -> Result<Vec<String>>;
}
