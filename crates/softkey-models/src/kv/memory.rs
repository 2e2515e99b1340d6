//! In-memory key-value backend.

use super::traits::KeyValueStore;
use crate::error::{ModelStoreError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// Volatile backend for tests and for hosts without durable storage.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    namespaces: RwLock<HashMap<String, BTreeMap<String, String>>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> ModelStoreError {
    ModelStoreError::Database {
        message: "In-memory store lock poisoned".to_string(),
        source: None,
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let namespaces = self.namespaces.read().map_err(|_| poisoned())?;
        Ok(namespaces
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let mut namespaces = self.namespaces.write().map_err(|_| poisoned())?;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<bool> {
        let mut namespaces = self.namespaces.write().map_err(|_| poisoned())?;
        Ok(namespaces
            .get_mut(namespace)
            .map(|entries| entries.remove(key).is_some())
            .unwrap_or(false))
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let namespaces = self.namespaces.read().map_err(|_| poisoned())?;
        Ok(namespaces
            .get(namespace)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.get("ns", "k").unwrap(), None);

        store.set("ns", "k", "v").unwrap();
        assert_eq!(store.get("ns", "k").unwrap().as_deref(), Some("v"));

        assert!(store.remove("ns", "k").unwrap());
        assert!(!store.remove("ns", "k").unwrap());
        assert_eq!(store.get("ns", "k").unwrap(), None);
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let store = MemoryKeyValueStore::new();
        store.set("a", "k", "1").unwrap();
        store.set("b", "k", "2").unwrap();

        assert_eq!(store.get("a", "k").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("b", "k").unwrap().as_deref(), Some("2"));
        assert_eq!(store.keys("a").unwrap(), vec!["k".to_string()]);
        assert!(store.keys("c").unwrap().is_empty());
    }
}
