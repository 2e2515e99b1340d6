//! Staging of model files from the application's bundled read-only assets.

use super::types::FileRequirement;
use crate::config::HashingConfig;
use crate::error::{ModelStoreError, Result};
use crate::fs_ops;
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Read-only bundle of assets shipped with the application.
pub trait AssetSource: Send + Sync {
    /// Open an asset, or `Ok(None)` when it is not bundled.
    fn open(&self, asset_path: &str) -> Result<Option<Box<dyn Read + Send>>>;

    /// Whether an asset is bundled.
    fn exists(&self, asset_path: &str) -> bool;
}

/// Asset source with nothing in it, for hosts that ship no models.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAssets;

impl AssetSource for NoAssets {
    fn open(&self, _asset_path: &str) -> Result<Option<Box<dyn Read + Send>>> {
        Ok(None)
    }

    fn exists(&self, _asset_path: &str) -> bool {
        false
    }
}

/// Assets laid out under a directory on disk.
#[derive(Debug, Clone)]
pub struct DirectoryAssetSource {
    root: PathBuf,
}

impl DirectoryAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an asset path, refusing anything that could leave the root.
    fn resolve(&self, asset_path: &str) -> Option<PathBuf> {
        let relative = Path::new(asset_path);
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        if resolved == self.root {
            return None;
        }
        Some(resolved)
    }
}

impl AssetSource for DirectoryAssetSource {
    fn open(&self, asset_path: &str) -> Result<Option<Box<dyn Read + Send>>> {
        let path = match self.resolve(asset_path) {
            Some(path) => path,
            None => {
                warn!("Refusing asset path outside the asset root: {}", asset_path);
                return Ok(None);
            }
        };
        match File::open(&path) {
            Ok(file) => Ok(Some(Box::new(BufReader::new(file)))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ModelStoreError::io_with_path(e, path)),
        }
    }

    fn exists(&self, asset_path: &str) -> bool {
        self.resolve(asset_path)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }
}

/// Copy the bundled asset for `requirement` to `destination`.
///
/// Returns `false` without creating any file when the requirement has no
/// asset or the asset is not bundled. A failed copy removes the partial
/// output. The caller re-verifies the staged file.
pub fn stage_from_asset(
    source: &dyn AssetSource,
    destination: &Path,
    requirement: &FileRequirement,
) -> bool {
    let asset_path = match requirement.asset_path.as_deref() {
        Some(asset_path) => asset_path,
        None => return false,
    };

    let reader = match source.open(asset_path) {
        Ok(Some(reader)) => reader,
        Ok(None) => {
            debug!("Asset {} not bundled", asset_path);
            return false;
        }
        Err(e) => {
            warn!("Failed to open asset {}: {}", asset_path, e);
            return false;
        }
    };

    match copy_asset(reader, destination, requirement.asset_gzipped) {
        Ok(bytes) => {
            debug!(
                "Staged asset {} -> {} ({} bytes)",
                asset_path,
                destination.display(),
                bytes
            );
            true
        }
        Err(e) => {
            warn!(
                "Failed to stage asset {} to {}: {}",
                asset_path,
                destination.display(),
                e
            );
            fs_ops::remove_file_best_effort(destination);
            false
        }
    }
}

fn copy_asset(reader: Box<dyn Read + Send>, destination: &Path, gzipped: bool) -> Result<u64> {
    if let Some(parent) = destination.parent() {
        fs_ops::ensure_dir(parent)?;
    }

    let mut reader: Box<dyn Read + Send> = if gzipped {
        Box::new(GzDecoder::new(reader))
    } else {
        reader
    };

    let file =
        File::create(destination).map_err(|e| ModelStoreError::io_with_path(e, destination))?;
    let mut writer = BufWriter::with_capacity(HashingConfig::STREAM_CHUNK_SIZE, file);
    let bytes = io::copy(&mut reader, &mut writer)
        .map_err(|e| ModelStoreError::io_with_path(e, destination))?;
    writer
        .flush()
        .map_err(|e| ModelStoreError::io_with_path(e, destination))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::TempDir;

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_stage_plain_and_gzipped_assets() {
        let temp_dir = TempDir::new().unwrap();
        let assets = temp_dir.path().join("assets");
        std::fs::create_dir_all(assets.join("models")).unwrap();
        std::fs::write(assets.join("models/m.vocab"), b"the\nquick\n").unwrap();
        std::fs::write(assets.join("models/m.arpa.gz"), gzip(b"\\data\\\n")).unwrap();
        let source = DirectoryAssetSource::new(&assets);

        let dest_dir = temp_dir.path().join("models").join("m");
        let vocab = FileRequirement::new("m.vocab").with_asset("models/m.vocab", false);
        assert!(stage_from_asset(&source, &dest_dir.join("m.vocab"), &vocab));
        assert_eq!(std::fs::read(dest_dir.join("m.vocab")).unwrap(), b"the\nquick\n");

        let arpa = FileRequirement::new("m.arpa").with_asset("models/m.arpa.gz", true);
        assert!(stage_from_asset(&source, &dest_dir.join("m.arpa"), &arpa));
        assert_eq!(std::fs::read(dest_dir.join("m.arpa")).unwrap(), b"\\data\\\n");
    }

    #[test]
    fn test_missing_asset_creates_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let source = DirectoryAssetSource::new(temp_dir.path().join("assets"));
        let dest = temp_dir.path().join("m.arpa");

        let requirement = FileRequirement::new("m.arpa").with_asset("models/m.arpa", false);
        assert!(!stage_from_asset(&source, &dest, &requirement));
        assert!(!stage_from_asset(&source, &dest, &FileRequirement::new("m.arpa")));
        assert!(!dest.exists());
    }

    #[test]
    fn test_corrupt_gzip_removes_partial_output() {
        let temp_dir = TempDir::new().unwrap();
        let assets = temp_dir.path().join("assets");
        std::fs::create_dir_all(&assets).unwrap();
        std::fs::write(assets.join("m.arpa.gz"), b"definitely not gzip").unwrap();
        let source = DirectoryAssetSource::new(&assets);
        let dest = temp_dir.path().join("out").join("m.arpa");

        let requirement = FileRequirement::new("m.arpa").with_asset("m.arpa.gz", true);
        assert!(!stage_from_asset(&source, &dest, &requirement));
        assert!(!dest.exists());
    }

    #[test]
    fn test_asset_paths_cannot_escape_root() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("secret"), b"x").unwrap();
        let source = DirectoryAssetSource::new(temp_dir.path().join("assets"));

        assert!(!source.exists("../secret"));
        assert!(source.open("../secret").unwrap().is_none());
        assert!(!source.exists("/etc/passwd"));
        assert!(!NoAssets.exists("models/m.arpa"));
    }
}
