//! Remote catalog documents.
//!
//! ```json
//! {"models": [{"definition": {...manifest...}, "bundleUrl": "...",
//!              "bundleSha256": "...", "bundleSizeBytes": 123,
//!              "version": 2, "recommended": true}]}
//! ```

use super::manifest::ManifestDocument;
use super::types::CatalogEntry;
use crate::error::Result;
use crate::network::StreamProvider;
use serde::Deserialize;
use std::io::Read;
use tracing::{debug, warn};

#[derive(Debug, Default, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    models: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogEntryDocument {
    definition: ManifestDocument,
    #[serde(default)]
    bundle_url: Option<String>,
    #[serde(default)]
    bundle_sha256: Option<String>,
    #[serde(default)]
    bundle_size_bytes: Option<i64>,
    #[serde(default)]
    version: Option<i32>,
    #[serde(default)]
    recommended: Option<bool>,
}

fn parse_entry(value: serde_json::Value) -> std::result::Result<CatalogEntry, String> {
    let document: CatalogEntryDocument =
        serde_json::from_value(value).map_err(|e| e.to_string())?;
    let definition = document.definition.into_definition().map_err(|e| e.to_string())?;

    let bundle_url = document
        .bundle_url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| format!("{}: missing bundleUrl", definition.id()))?;
    let bundle_sha256 = document
        .bundle_sha256
        .filter(|sha| !sha.trim().is_empty())
        .ok_or_else(|| format!("{}: missing bundleSha256", definition.id()))?;

    let mut entry = CatalogEntry::new(definition, bundle_url, bundle_sha256);
    entry.bundle_size_bytes = document
        .bundle_size_bytes
        .and_then(|size| u64::try_from(size).ok());
    entry.version = document.version.unwrap_or(0);
    entry.recommended = document.recommended.unwrap_or(false);
    Ok(entry)
}

/// Parse a catalog document. Malformed entries are logged and skipped.
pub fn parse_catalog(bytes: &[u8]) -> Result<Vec<CatalogEntry>> {
    let document: CatalogDocument = serde_json::from_slice(bytes)?;

    let mut entries = Vec::new();
    for (index, value) in document.models.unwrap_or_default().into_iter().enumerate() {
        match parse_entry(value) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!("Skipping catalog entry {}: {}", index, e),
        }
    }
    debug!("Parsed catalog with {} entries", entries.len());
    Ok(entries)
}

/// Download and parse the catalog at `url`. A blank URL is an empty catalog.
pub fn fetch_catalog(provider: &dyn StreamProvider, url: &str) -> Result<Vec<CatalogEntry>> {
    if url.trim().is_empty() {
        return Ok(Vec::new());
    }
    let mut reader = provider.open(url)?;
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(|e| crate::error::ModelStoreError::Network {
        message: format!("Failed reading catalog {}: {}", url, e),
        cause: None,
    })?;
    parse_catalog(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelStoreError;
    use std::io::Cursor;

    const CATALOG: &str = r#"{
        "models": [
            {
                "definition": {
                    "id": "en-3gram",
                    "label": "English",
                    "engine": "ngram",
                    "files": [
                        {"type": "arpa", "filename": "en.arpa", "sha256": "aa"},
                        {"type": "vocab", "filename": "en.vocab", "sha256": "bb"}
                    ]
                },
                "bundleUrl": "https://example.com/en.zip",
                "bundleSha256": "CC",
                "bundleSizeBytes": 1024,
                "version": 3,
                "recommended": true
            },
            {
                "definition": {"id": "broken", "files": [{"type": "arpa", "filename": "b.arpa"}]},
                "bundleUrl": "https://example.com/b.zip",
                "bundleSha256": "dd"
            },
            {
                "definition": {
                    "id": "no-url",
                    "files": [
                        {"type": "arpa", "filename": "n.arpa"},
                        {"type": "vocab", "filename": "n.vocab"}
                    ]
                },
                "bundleSha256": "ee"
            },
            {
                "definition": {
                    "id": "de-3gram",
                    "files": [
                        {"type": "arpa", "filename": "de.arpa"},
                        {"type": "vocab", "filename": "de.vocab"}
                    ]
                },
                "bundleUrl": "https://example.com/de.zip",
                "bundleSha256": "ff",
                "bundleSizeBytes": -1
            }
        ]
    }"#;

    struct StaticProvider(&'static str);

    impl StreamProvider for StaticProvider {
        fn open(&self, _url: &str) -> Result<Box<dyn Read + Send>> {
            Ok(Box::new(Cursor::new(self.0.as_bytes())))
        }
    }

    #[test]
    fn test_parse_catalog_skips_malformed_entries() {
        let entries = parse_catalog(CATALOG.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);

        let en = &entries[0];
        assert_eq!(en.definition.id(), "en-3gram");
        assert_eq!(en.bundle_url, "https://example.com/en.zip");
        assert_eq!(en.bundle_sha256, "CC");
        assert_eq!(en.bundle_size_bytes, Some(1024));
        assert_eq!(en.version, 3);
        assert!(en.recommended);

        let de = &entries[1];
        assert_eq!(de.bundle_size_bytes, None);
        assert_eq!(de.version, 0);
        assert!(!de.recommended);
    }

    #[test]
    fn test_empty_catalogs() {
        assert!(parse_catalog(b"{}").unwrap().is_empty());
        assert!(parse_catalog(br#"{"models": []}"#).unwrap().is_empty());
        assert!(matches!(
            parse_catalog(b"[not json").unwrap_err(),
            ModelStoreError::Json { .. }
        ));
    }

    #[test]
    fn test_fetch_catalog() {
        let provider = StaticProvider(CATALOG);
        assert_eq!(fetch_catalog(&provider, "https://x/catalog.json").unwrap().len(), 2);
        assert!(fetch_catalog(&provider, "  ").unwrap().is_empty());
    }
}
