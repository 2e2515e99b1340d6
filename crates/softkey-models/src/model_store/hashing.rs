//! Streaming SHA-256 computation for model files and download streams.

use crate::cancel::CancellationToken;
use crate::config::HashingConfig;
use crate::error::{ModelStoreError, Result};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use std::path::Path;

/// Compute the SHA-256 of a file as lowercase hex.
///
/// # Arguments
///
/// * `path` - Path to the file to hash
pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| ModelStoreError::io_with_path(e, path))?;

    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HashingConfig::CHUNK_SIZE];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| ModelStoreError::io_with_path(e, path))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Result of [`copy_hashing`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDigest {
    /// Lowercase hex SHA-256 of everything copied.
    pub sha256: String,
    pub bytes: u64,
}

/// Copy `reader` into `writer` while hashing the bytes.
///
/// The token is checked before every chunk; cancellation returns
/// [`ModelStoreError::Cancelled`] and leaves whatever was written so far for
/// the caller to clean up.
pub fn copy_hashing<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
    cancel: &CancellationToken,
) -> Result<StreamDigest> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; HashingConfig::STREAM_CHUNK_SIZE];
    let mut bytes: u64 = 0;

    loop {
        cancel.check()?;
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                return Err(ModelStoreError::Network {
                    message: format!("Failed reading stream: {}", e),
                    cause: None,
                })
            }
        };
        hasher.update(&buffer[..bytes_read]);
        writer.write_all(&buffer[..bytes_read])?;
        bytes += bytes_read as u64;
    }
    writer.flush()?;

    Ok(StreamDigest {
        sha256: hex::encode(hasher.finalize()),
        bytes,
    })
}

/// Case-insensitive comparison of two hex digests.
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.trim().eq_ignore_ascii_case(actual.trim())
}
