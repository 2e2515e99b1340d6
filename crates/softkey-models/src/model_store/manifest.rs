//! `manifest.json` codec.
//!
//! ```json
//! {
//!   "id": "en-3gram",
//!   "label": "English 3-gram",
//!   "engine": "ngram",
//!   "files": [
//!     {"type": "arpa", "filename": "en.arpa", "sha256": "…", "assetPath": "models/en.arpa.gz", "assetGzipped": true},
//!     {"type": "vocab", "filename": "en.vocab"}
//!   ]
//! }
//! ```
//!
//! Serialization is deterministic: the same definition always produces the
//! same bytes, in requirement declaration order.

use super::types::{EngineType, FileRequirement, ModelDefinition};
use crate::error::{ModelStoreError, Result};
use crate::fs_ops;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Id of the n-gram model shipped inside the application assets.
pub const BUILTIN_MODEL_ID: &str = "kenlm_librispeech_3gram_pruned_3e7";

/// Raw manifest as found on disk or embedded in a catalog entry.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ManifestDocument {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    engine: Option<String>,
    #[serde(default)]
    files: Option<Vec<ManifestFileEntry>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManifestFileEntry {
    #[serde(rename = "type", default)]
    file_type: Option<String>,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    sha256: Option<String>,
    #[serde(default)]
    asset_path: Option<String>,
    #[serde(default)]
    asset_gzipped: Option<bool>,
}

#[derive(Serialize)]
struct ManifestOut<'a> {
    id: &'a str,
    label: &'a str,
    engine: &'static str,
    files: Vec<ManifestFileOut<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestFileOut<'a> {
    #[serde(rename = "type")]
    file_type: &'a str,
    filename: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha256: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    asset_path: Option<&'a str>,
    #[serde(skip_serializing_if = "is_false")]
    asset_gzipped: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl ManifestDocument {
    /// Validate and convert into a definition.
    pub(crate) fn into_definition(self) -> Result<ModelDefinition> {
        let id = non_blank(self.id)
            .ok_or_else(|| ModelStoreError::validation("id", "Missing required key id"))?;
        let engine_type = EngineType::parse(self.engine.as_deref().unwrap_or(""))?;

        let files = self.files.unwrap_or_default();
        if files.is_empty() {
            return Err(ModelStoreError::validation(
                "files",
                format!("Model manifest {} missing files array", id),
            ));
        }

        let mut builder = ModelDefinition::builder(id.clone()).engine_type(engine_type);
        if let Some(label) = self.label {
            builder = builder.label(label);
        }

        for entry in files {
            let file_type = entry.file_type.unwrap_or_default();
            if file_type.trim().is_empty() {
                continue;
            }
            let filename = non_blank(entry.filename).ok_or_else(|| {
                ModelStoreError::validation(
                    "files.filename",
                    format!("Model {} file type {} missing filename", id, file_type),
                )
            })?;
            let mut requirement = FileRequirement::new(filename);
            requirement.sha256 = non_blank(entry.sha256);
            requirement.asset_path = non_blank(entry.asset_path);
            requirement.asset_gzipped = entry.asset_gzipped.unwrap_or(false);
            builder = builder.requirement(&file_type, requirement);
        }

        builder.build()
    }
}

/// Parse manifest bytes into a validated definition.
pub fn parse(bytes: &[u8]) -> Result<ModelDefinition> {
    let document: ManifestDocument = serde_json::from_slice(bytes).map_err(|e| {
        ModelStoreError::validation("manifest", format!("Invalid manifest JSON: {}", e))
    })?;
    document.into_definition()
}

/// Serialize a definition to pretty-printed manifest bytes.
pub fn serialize(definition: &ModelDefinition) -> Result<Vec<u8>> {
    let out = ManifestOut {
        id: definition.id(),
        label: definition.label(),
        engine: definition.engine_type().as_str(),
        files: definition
            .requirements()
            .map(|(file_type, requirement)| ManifestFileOut {
                file_type,
                filename: &requirement.filename,
                sha256: requirement.sha256.as_deref(),
                asset_path: requirement.asset_path.as_deref(),
                asset_gzipped: requirement.asset_gzipped,
            })
            .collect(),
    };
    let mut bytes = serde_json::to_vec_pretty(&out)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Read and parse a manifest file.
pub fn read_manifest(path: &Path) -> Result<ModelDefinition> {
    let bytes = std::fs::read(path).map_err(|e| ModelStoreError::io_with_path(e, path))?;
    parse(&bytes)
}

/// Atomically write a manifest file.
pub fn write_manifest(path: &Path, definition: &ModelDefinition) -> Result<()> {
    fs_ops::atomic_write(path, &serialize(definition)?)
}

/// The n-gram model the application ships in its assets.
///
/// Only offered by discovery when its assets are actually bundled.
pub fn builtin_default() -> ModelDefinition {
    let definition = ModelDefinition::builder(BUILTIN_MODEL_ID)
        .label("LibriSpeech 3-gram (pruned 3e-7)")
        .engine_type(EngineType::Ngram)
        .requirement(
            "arpa",
            FileRequirement::new("3-gram.pruned.3e-7.arpa")
                .with_sha256("30a34a3fbb83fd77ed95738ab57d84c37565a2cd02a6c9472f3020c2681bb3c7")
                .with_asset("models/kenlm/3-gram.pruned.3e-7.arpa.gz", true),
        )
        .requirement(
            "vocab",
            FileRequirement::new("3-gram.pruned.3e-7.vocab")
                .with_sha256("7af9ac90bc819750d15e8a3ba8d4b7b4d131c55d94d3e080523779b2b1b8e9f5")
                .with_asset("models/kenlm/3-gram.pruned.3e-7.vocab", false),
        )
        .build();

    match definition {
        Ok(definition) => definition,
        Err(e) => unreachable!("built-in definition is statically valid: {}", e),
    }
}
