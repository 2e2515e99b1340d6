//! Domain types for installable prediction models.

use crate::config::LayoutConfig;
use crate::error::{ModelStoreError, Result};
use std::path::{Path, PathBuf};

/// Prediction backend a model serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineType {
    /// Statistical n-gram language model (ARPA + vocabulary).
    Ngram,
    /// Neural network weights plus a BPE tokenizer.
    Neural,
}

impl EngineType {
    pub const ALL: [EngineType; 2] = [EngineType::Ngram, EngineType::Neural];

    /// Canonical manifest spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineType::Ngram => "ngram",
            EngineType::Neural => "neural",
        }
    }

    /// File types every definition of this engine must declare.
    pub fn required_file_types(&self) -> &'static [&'static str] {
        match self {
            EngineType::Ngram => &[file_types::ARPA, file_types::VOCAB],
            EngineType::Neural => &[
                file_types::ONNX,
                file_types::TOKENIZER_VOCAB,
                file_types::TOKENIZER_MERGES,
            ],
        }
    }

    /// Parse a manifest `engine` value.
    ///
    /// Accepts the canonical names and the legacy `presage_ngram` /
    /// `onnx_transformer` spellings, trimmed and case-insensitively. An empty
    /// value means n-gram.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "ngram" | "presage_ngram" => Ok(EngineType::Ngram),
            "neural" | "onnx_transformer" => Ok(EngineType::Neural),
            _ => Err(ModelStoreError::validation(
                "engine",
                format!("Unsupported engine type: {}", value),
            )),
        }
    }
}

impl std::fmt::Display for EngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EngineType {
    type Err = ModelStoreError;

    fn from_str(s: &str) -> Result<Self> {
        EngineType::parse(s)
    }
}

/// Well-known file type keys.
pub mod file_types {
    pub const ARPA: &str = "arpa";
    pub const VOCAB: &str = "vocab";
    pub const ONNX: &str = "onnx";
    pub const TOKENIZER_VOCAB: &str = "tokenizer.vocab";
    pub const TOKENIZER_MERGES: &str = "tokenizer.merges";
}

/// Reject anything that is not a single, plain path component.
///
/// Model ids name directories and filenames name files directly inside
/// them; both come from untrusted manifests.
pub(crate) fn validate_path_component(field: &str, value: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ModelStoreError::validation(field, "must not be empty"));
    }
    if value.starts_with('.')
        || value.contains(['/', '\\', '\0', ':'])
        || Path::new(value).components().count() != 1
    {
        return Err(ModelStoreError::validation(
            field,
            format!("'{}' is not a plain file name", value),
        ));
    }
    Ok(())
}

/// One file belonging to a model definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRequirement {
    /// File name inside the model directory.
    pub filename: String,
    /// Expected SHA-256 (hex, any case). `None` disables integrity checks.
    pub sha256: Option<String>,
    /// Path into the bundled read-only assets. `None` means download-only.
    pub asset_path: Option<String>,
    /// Whether the bundled asset is gzip-compressed.
    pub asset_gzipped: bool,
}

impl FileRequirement {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            sha256: None,
            asset_path: None,
            asset_gzipped: false,
        }
    }

    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.sha256 = Some(sha256.into()).filter(|s: &String| !s.trim().is_empty());
        self
    }

    pub fn with_asset(mut self, asset_path: impl Into<String>, gzipped: bool) -> Self {
        self.asset_path = Some(asset_path.into()).filter(|s: &String| !s.trim().is_empty());
        self.asset_gzipped = gzipped;
        self
    }
}

/// Identity and file requirements of one installable model.
///
/// Always valid: construction fails unless every file type required by the
/// engine type is present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDefinition {
    id: String,
    label: String,
    engine_type: EngineType,
    requirements: Vec<(String, FileRequirement)>,
}

impl ModelDefinition {
    pub fn builder(id: impl Into<String>) -> ModelDefinitionBuilder {
        ModelDefinitionBuilder::new(id)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn engine_type(&self) -> EngineType {
        self.engine_type
    }

    /// Requirement for a file type (case-insensitive).
    pub fn requirement(&self, file_type: &str) -> Option<&FileRequirement> {
        let wanted = file_type.to_ascii_lowercase();
        self.requirements
            .iter()
            .find(|(key, _)| *key == wanted)
            .map(|(_, requirement)| requirement)
    }

    /// Requirements in declaration order.
    pub fn requirements(&self) -> impl Iterator<Item = (&str, &FileRequirement)> {
        self.requirements
            .iter()
            .map(|(key, requirement)| (key.as_str(), requirement))
    }

    pub fn requirement_count(&self) -> usize {
        self.requirements.len()
    }
}

/// Builder for [`ModelDefinition`].
#[derive(Debug, Clone)]
pub struct ModelDefinitionBuilder {
    id: String,
    label: Option<String>,
    engine_type: EngineType,
    requirements: Vec<(String, FileRequirement)>,
}

impl ModelDefinitionBuilder {
    fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            engine_type: EngineType::Ngram,
            requirements: Vec::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn engine_type(mut self, engine_type: EngineType) -> Self {
        self.engine_type = engine_type;
        self
    }

    /// Add or replace the requirement for `file_type`.
    ///
    /// A replaced type keeps its first position.
    pub fn requirement(mut self, file_type: &str, requirement: FileRequirement) -> Self {
        let key = file_type.trim().to_ascii_lowercase();
        match self.requirements.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = requirement,
            None => self.requirements.push((key, requirement)),
        }
        self
    }

    pub fn build(self) -> Result<ModelDefinition> {
        validate_path_component("id", &self.id)?;

        for (file_type, requirement) in &self.requirements {
            if file_type.is_empty() {
                return Err(ModelStoreError::validation("files.type", "must not be empty"));
            }
            validate_path_component("files.filename", &requirement.filename)?;
            if requirement
                .filename
                .eq_ignore_ascii_case(LayoutConfig::MANIFEST_FILE_NAME)
            {
                return Err(ModelStoreError::validation(
                    "files.filename",
                    format!("{} is reserved for the manifest", requirement.filename),
                ));
            }
        }

        for required in self.engine_type.required_file_types() {
            if !self.requirements.iter().any(|(key, _)| key == required) {
                return Err(ModelStoreError::validation(
                    "files",
                    format!("Model {} missing {} requirement", self.id, required),
                ));
            }
        }

        let label = match self.label {
            Some(label) if !label.trim().is_empty() => label,
            _ => self.id.clone(),
        };

        Ok(ModelDefinition {
            id: self.id,
            label,
            engine_type: self.engine_type,
            requirements: self.requirements,
        })
    }
}

/// A resolved, installed, verified model ready for an engine to load.
///
/// Never mutated after creation. It goes stale if the model is removed, so
/// callers re-resolve through the store instead of caching it forever.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveModel {
    definition: ModelDefinition,
    directory: PathBuf,
    files: Vec<(String, PathBuf)>,
}

impl ActiveModel {
    pub(crate) fn new(
        definition: ModelDefinition,
        directory: PathBuf,
        files: Vec<(String, PathBuf)>,
    ) -> Self {
        Self {
            definition,
            directory,
            files,
        }
    }

    pub fn definition(&self) -> &ModelDefinition {
        &self.definition
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Installed path for a file type (case-insensitive).
    pub fn file(&self, file_type: &str) -> Option<&Path> {
        let wanted = file_type.to_ascii_lowercase();
        self.files
            .iter()
            .find(|(key, _)| *key == wanted)
            .map(|(_, path)| path.as_path())
    }

    /// Installed paths in requirement order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.files
            .iter()
            .map(|(key, path)| (key.as_str(), path.as_path()))
    }
}

/// A downloadable bundle advertised by a model catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub definition: ModelDefinition,
    pub bundle_url: String,
    /// Expected SHA-256 of the zip; empty disables the bundle-level check.
    pub bundle_sha256: String,
    pub bundle_size_bytes: Option<u64>,
    pub version: i32,
    pub recommended: bool,
}

impl CatalogEntry {
    pub fn new(
        definition: ModelDefinition,
        bundle_url: impl Into<String>,
        bundle_sha256: impl Into<String>,
    ) -> Self {
        Self {
            definition,
            bundle_url: bundle_url.into(),
            bundle_sha256: bundle_sha256.into(),
            bundle_size_bytes: None,
            version: 0,
            recommended: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn ngram_builder(id: &str) -> ModelDefinitionBuilder {
        ModelDefinition::builder(id)
            .requirement("arpa", FileRequirement::new("m.arpa"))
            .requirement("vocab", FileRequirement::new("m.vocab"))
    }

    #[test]
    fn test_engine_type_parse_aliases() {
        assert_eq!(EngineType::parse("ngram").unwrap(), EngineType::Ngram);
        assert_eq!(EngineType::parse(" Presage_Ngram ").unwrap(), EngineType::Ngram);
        assert_eq!(EngineType::parse("").unwrap(), EngineType::Ngram);
        assert_eq!(EngineType::parse("NEURAL").unwrap(), EngineType::Neural);
        assert_eq!(
            EngineType::parse("onnx_transformer").unwrap(),
            EngineType::Neural
        );
        assert_eq!(
            EngineType::parse("markov").unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_label_defaults_to_id() {
        let definition = ngram_builder("en-3gram").label("  ").build().unwrap();
        assert_eq!(definition.label(), "en-3gram");
    }

    #[test]
    fn test_ngram_requires_vocab() {
        let err = ModelDefinition::builder("en")
            .requirement("arpa", FileRequirement::new("m.arpa"))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("vocab"));
        assert!(err.to_string().contains("en"));
    }

    #[test]
    fn test_neural_requires_tokenizer_files() {
        let err = ModelDefinition::builder("nn")
            .engine_type(EngineType::Neural)
            .requirement("onnx", FileRequirement::new("m.onnx"))
            .requirement("tokenizer.vocab", FileRequirement::new("vocab.json"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("tokenizer.merges"));
    }

    #[test]
    fn test_replaced_requirement_keeps_position() {
        let definition = ngram_builder("en")
            .requirement("ARPA", FileRequirement::new("other.arpa"))
            .build()
            .unwrap();
        let order: Vec<_> = definition
            .requirements()
            .map(|(k, r)| (k, r.filename.as_str()))
            .collect();
        assert_eq!(order, vec![("arpa", "other.arpa"), ("vocab", "m.vocab")]);
    }

    #[test]
    fn test_unsafe_ids_and_filenames_rejected() {
        for id in ["", "..", ".hidden", "a/b", "a\\b", "C:evil"] {
            assert!(ngram_builder(id).build().is_err(), "id {:?} accepted", id);
        }
        let err = ModelDefinition::builder("en")
            .requirement("arpa", FileRequirement::new("../../etc/passwd"))
            .requirement("vocab", FileRequirement::new("m.vocab"))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_manifest_file_name_is_reserved() {
        for filename in ["manifest.json", "Manifest.JSON"] {
            let err = ModelDefinition::builder("en")
                .requirement("arpa", FileRequirement::new(filename))
                .requirement("vocab", FileRequirement::new("m.vocab"))
                .build()
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn test_active_model_lookup_is_case_insensitive() {
        let definition = ngram_builder("en").build().unwrap();
        let active = ActiveModel::new(
            definition,
            PathBuf::from("/models/en"),
            vec![
                ("arpa".into(), PathBuf::from("/models/en/m.arpa")),
                ("vocab".into(), PathBuf::from("/models/en/m.vocab")),
            ],
        );
        assert_eq!(active.file("ARPA"), Some(Path::new("/models/en/m.arpa")));
        assert_eq!(active.files().count(), 2);
    }
}
