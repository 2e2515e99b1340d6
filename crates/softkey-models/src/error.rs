//! Error types for the model store.
//!
//! Every failure surfaced by the store maps onto a small, stable set of
//! [`ErrorKind`]s so that callers (settings screens, download buttons) can
//! pick an actionable message without matching on individual variants.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the model store.
#[derive(Debug, Error)]
pub enum ModelStoreError {
    // Manifest / definition errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Integrity errors
    #[error("Hash mismatch for {subject}: expected {expected}, got {actual}")]
    HashMismatch {
        subject: String,
        expected: String,
        actual: String,
    },

    // Missing payload errors
    #[error("Model {model_id} missing required file {filename}")]
    MissingFile { model_id: String, filename: String },

    #[error("Model not found: {model_id}")]
    ModelNotFound { model_id: String },

    // Archive errors
    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Downloaded bundle for {model_id} is missing manifest.json")]
    ManifestNotFound { model_id: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Durable state errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Download cancelled")]
    Cancelled,
}

/// Coarse error categories exposed to the rest of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Manifest missing a field or a file required for its engine type.
    Validation,
    /// Checksum mismatch for a single file or a whole bundle.
    Integrity,
    /// Required file absent after staging/extraction.
    MissingFile,
    /// Unreadable zip, or manifest not found even after flattening.
    Archive,
    /// Filesystem failure creating, deleting or moving files.
    Io,
    /// Transport failure while fetching a bundle or catalog.
    Network,
    /// Failure of the durable key-value state.
    Storage,
    /// The caller cancelled the operation.
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Integrity => "integrity",
            ErrorKind::MissingFile => "missing-file",
            ErrorKind::Archive => "archive",
            ErrorKind::Io => "io",
            ErrorKind::Network => "network",
            ErrorKind::Storage => "storage",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Result type alias for model store operations.
pub type Result<T> = std::result::Result<T, ModelStoreError>;

impl From<std::io::Error> for ModelStoreError {
    fn from(err: std::io::Error) -> Self {
        ModelStoreError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ModelStoreError {
    fn from(err: serde_json::Error) -> Self {
        ModelStoreError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for ModelStoreError {
    fn from(err: rusqlite::Error) -> Self {
        ModelStoreError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for ModelStoreError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {}", err)
        } else {
            err.to_string()
        };
        ModelStoreError::Network {
            message,
            cause: err.url().map(|u| u.to_string()),
        }
    }
}

impl From<zip::result::ZipError> for ModelStoreError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => ModelStoreError::from(io),
            other => ModelStoreError::Archive {
                message: other.to_string(),
            },
        }
    }
}

impl From<walkdir::Error> for ModelStoreError {
    fn from(err: walkdir::Error) -> Self {
        let path = err.path().map(|p| p.to_path_buf());
        let message = err.to_string();
        ModelStoreError::Io {
            message,
            path,
            source: err.into_io_error(),
        }
    }
}

impl ModelStoreError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ModelStoreError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a validation error for a named field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ModelStoreError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Map this error onto the coarse category shown to users.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelStoreError::Validation { .. } | ModelStoreError::Json { .. } => {
                ErrorKind::Validation
            }
            ModelStoreError::HashMismatch { .. } => ErrorKind::Integrity,
            ModelStoreError::MissingFile { .. } | ModelStoreError::ModelNotFound { .. } => {
                ErrorKind::MissingFile
            }
            ModelStoreError::Archive { .. } | ModelStoreError::ManifestNotFound { .. } => {
                ErrorKind::Archive
            }
            ModelStoreError::Io { .. } => ErrorKind::Io,
            ModelStoreError::Database { .. } => ErrorKind::Storage,
            ModelStoreError::Network { .. } => ErrorKind::Network,
            ModelStoreError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether a caller-driven retry has a chance of succeeding.
    ///
    /// The store itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ModelStoreError::Network { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelStoreError::MissingFile {
            model_id: "en-3gram".into(),
            filename: "en.vocab".into(),
        };
        assert_eq!(err.to_string(), "Model en-3gram missing required file en.vocab");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ModelStoreError::HashMismatch {
                subject: "bundle".into(),
                expected: "aa".into(),
                actual: "bb".into(),
            }
            .kind(),
            ErrorKind::Integrity
        );
        assert_eq!(
            ModelStoreError::ManifestNotFound {
                model_id: "m".into()
            }
            .kind(),
            ErrorKind::Archive
        );
        assert_eq!(ModelStoreError::Cancelled.kind(), ErrorKind::Cancelled);
        assert_eq!(ErrorKind::MissingFile.to_string(), "missing-file");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(ModelStoreError::Network {
            message: "reset".into(),
            cause: None
        }
        .is_retryable());
        assert!(!ModelStoreError::validation("id", "empty").is_retryable());
    }

    #[test]
    fn test_zip_io_error_maps_to_io() {
        let err: ModelStoreError =
            zip::result::ZipError::Io(std::io::Error::other("disk gone")).into();
        assert_eq!(err.kind(), ErrorKind::Io);
        let err: ModelStoreError = zip::result::ZipError::InvalidArchive("bad".into()).into();
        assert_eq!(err.kind(), ErrorKind::Archive);
    }
}
