//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use softkey_models::{ModelStore, ModelStoreError, Result, StreamProvider};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use zip::write::SimpleFileOptions;

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// Build a zip in memory. Names ending in `/` become directories.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        if name.ends_with('/') {
            writer
                .add_directory(name.trim_end_matches('/'), SimpleFileOptions::default())
                .unwrap();
        } else {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// N-gram manifest JSON declaring `<id>.arpa` and `<id>.vocab` with hashes.
pub fn ngram_manifest(id: &str, arpa: &[u8], vocab: &[u8]) -> String {
    format!(
        r#"{{
  "id": "{id}",
  "label": "{id} model",
  "engine": "ngram",
  "files": [
    {{"type": "arpa", "filename": "{id}.arpa", "sha256": "{}"}},
    {{"type": "vocab", "filename": "{id}.vocab", "sha256": "{}"}}
  ]
}}"#,
        sha(arpa),
        sha(vocab)
    )
}

/// Install an n-gram model directly on disk, bypassing the installer.
pub fn install_on_disk(root: &Path, id: &str, arpa: &[u8], vocab: &[u8]) {
    let dir = root.join(id);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{id}.arpa")), arpa).unwrap();
    std::fs::write(dir.join(format!("{id}.vocab")), vocab).unwrap();
    std::fs::write(dir.join("manifest.json"), ngram_manifest(id, arpa, vocab)).unwrap();
}

/// Transport serving fixed byte blobs by URL and counting requests.
#[derive(Default)]
pub struct MemoryProvider {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl MemoryProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, bytes: Vec<u8>) {
        self.blobs.lock().unwrap().insert(url.to_string(), bytes);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl StreamProvider for MemoryProvider {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>> {
        self.requests.lock().unwrap().push(url.to_string());
        match self.blobs.lock().unwrap().get(url) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            None => Err(ModelStoreError::Network {
                message: format!("HTTP 404 when fetching {url}"),
                cause: None,
            }),
        }
    }
}

/// A store over `root` with in-memory state and the given transport.
pub fn store_with(root: &Path, provider: Arc<MemoryProvider>) -> ModelStore {
    ModelStore::builder(root).transport(provider).build().unwrap()
}

/// Names of the entries directly under `dir`, sorted.
pub fn dir_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
