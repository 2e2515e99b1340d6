//! SQLite-backed durable key-value store.

use super::traits::KeyValueStore;
use crate::error::{ModelStoreError, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// SQLite key-value backend.
///
/// One row per `(namespace, key)`. Every call runs as a single statement, so
/// each get/set/remove is atomic and survives a process crash.
pub struct SqliteKeyValueStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKeyValueStore {
    /// Open (or create) the database at `db_path`.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ModelStoreError::io_with_path(e, parent))?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| ModelStoreError::Database {
            message: format!("Failed to open state database {}: {}", db_path.display(), e),
            source: Some(e),
        })?;

        // WAL keeps readers unblocked while a writer commits
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self::from_connection(conn)?;
        debug!("Opened state database {}", db_path.display());
        Ok(store)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            "#,
        )
        .map_err(|e| ModelStoreError::Database {
            message: format!("Failed to initialize state schema: {}", e),
            source: Some(e),
        })?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| ModelStoreError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        let value = conn
            .query_row(
                "SELECT value FROM kv_entries WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv_entries (namespace, key, value) VALUES (?1, ?2, ?3)",
            params![namespace, key, value],
        )?;
        Ok(())
    }

    fn remove(&self, namespace: &str, key: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM kv_entries WHERE namespace = ?1 AND key = ?2",
            params![namespace, key],
        )?;
        Ok(removed > 0)
    }

    fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT key FROM kv_entries WHERE namespace = ?1 ORDER BY key")?;
        let keys = stmt
            .query_map(params![namespace], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}
