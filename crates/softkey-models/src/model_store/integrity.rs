//! Integrity verification with a persistent digest cache.
//!
//! Hashing a multi-hundred-megabyte ARPA file on every activation is too
//! slow, so the last verified digest of each installed file is remembered in
//! the `digests` namespace of the key-value store. Entries are only written
//! after a fresh hash matched the expected value.

use super::hashing;
use super::types::{FileRequirement, ModelDefinition};
use crate::config::StateConfig;
use crate::error::Result;
use crate::kv::KeyValueStore;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Verified digests keyed by `(model id, filename)`.
///
/// Keys are stored as a two-element JSON array, so no filename can collide
/// with another model's entries whatever characters it contains.
#[derive(Clone)]
pub struct DigestCache {
    kv: Arc<dyn KeyValueStore>,
}

impl DigestCache {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    fn key(model_id: &str, filename: &str) -> String {
        serde_json::Value::from(vec![model_id, filename]).to_string()
    }

    fn parse_key(key: &str) -> Option<(String, String)> {
        let parts: Vec<String> = serde_json::from_str(key).ok()?;
        match <[String; 2]>::try_from(parts) {
            Ok([model_id, filename]) => Some((model_id, filename)),
            Err(_) => None,
        }
    }

    pub fn get(&self, model_id: &str, filename: &str) -> Result<Option<String>> {
        self.kv
            .get(StateConfig::DIGEST_NAMESPACE, &Self::key(model_id, filename))
    }

    /// Record a freshly verified digest (stored lowercase).
    pub fn put(&self, model_id: &str, filename: &str, sha256: &str) -> Result<()> {
        self.kv.set(
            StateConfig::DIGEST_NAMESPACE,
            &Self::key(model_id, filename),
            &sha256.trim().to_ascii_lowercase(),
        )
    }

    pub fn forget(&self, model_id: &str, filename: &str) -> Result<bool> {
        self.kv
            .remove(StateConfig::DIGEST_NAMESPACE, &Self::key(model_id, filename))
    }

    /// Drop every entry belonging to `model_id`. Returns how many were removed.
    pub fn purge_model(&self, model_id: &str) -> Result<usize> {
        let mut removed = 0;
        for key in self.kv.keys(StateConfig::DIGEST_NAMESPACE)? {
            let belongs = Self::parse_key(&key)
                .map(|(id, _)| id == model_id)
                .unwrap_or(false);
            if belongs && self.kv.remove(StateConfig::DIGEST_NAMESPACE, &key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// How a file passed or failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// No expected hash declared; the file exists and is non-empty.
    Unchecked,
    /// The cached digest equals the expected hash; the file was not read.
    CacheHit,
    /// The file was hashed and matched.
    Hashed,
    /// The file is absent or empty.
    Missing,
    /// The file was hashed and did not match, or could not be read.
    Mismatch,
}

impl Verification {
    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            Verification::Unchecked | Verification::CacheHit | Verification::Hashed
        )
    }
}

/// Decides whether on-disk files satisfy their requirements.
#[derive(Clone)]
pub struct IntegrityVerifier {
    cache: DigestCache,
}

impl IntegrityVerifier {
    pub fn new(cache: DigestCache) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &DigestCache {
        &self.cache
    }

    /// Whether `file` satisfies `requirement`.
    ///
    /// Never deletes anything; callers remove files that fail.
    pub fn is_valid(
        &self,
        definition: &ModelDefinition,
        requirement: &FileRequirement,
        file: &Path,
    ) -> bool {
        self.verify(definition, requirement, file).is_valid()
    }

    pub fn verify(
        &self,
        definition: &ModelDefinition,
        requirement: &FileRequirement,
        file: &Path,
    ) -> Verification {
        let len = match std::fs::metadata(file) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => return Verification::Missing,
        };
        if len == 0 {
            return Verification::Missing;
        }

        let expected = match requirement.sha256.as_deref() {
            Some(expected) => expected,
            None => return Verification::Unchecked,
        };

        match self.cache.get(definition.id(), &requirement.filename) {
            Ok(Some(cached)) if hashing::digests_match(expected, &cached) => {
                return Verification::CacheHit
            }
            Ok(_) => {}
            Err(e) => warn!(
                "Digest cache lookup failed for {}/{}: {}",
                definition.id(),
                requirement.filename,
                e
            ),
        }

        let actual = match hashing::sha256_file(file) {
            Ok(actual) => actual,
            Err(e) => {
                warn!("Failed to hash {}: {}", file.display(), e);
                self.forget_quietly(definition.id(), &requirement.filename);
                return Verification::Mismatch;
            }
        };

        if hashing::digests_match(expected, &actual) {
            if let Err(e) = self.cache.put(definition.id(), &requirement.filename, &actual) {
                warn!(
                    "Failed to cache digest for {}/{}: {}",
                    definition.id(),
                    requirement.filename,
                    e
                );
            }
            debug!("Verified {} ({})", file.display(), actual);
            Verification::Hashed
        } else {
            warn!(
                "Checksum mismatch for {}: expected {}, got {}",
                file.display(),
                expected,
                actual
            );
            self.forget_quietly(definition.id(), &requirement.filename);
            Verification::Mismatch
        }
    }

    /// Remove a stale cache entry, logging instead of failing.
    pub fn forget_quietly(&self, model_id: &str, filename: &str) {
        if let Err(e) = self.cache.forget(model_id, filename) {
            warn!("Failed to drop digest for {}/{}: {}", model_id, filename, e);
        }
    }
}
