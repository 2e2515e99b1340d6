//! Stream providers.

use crate::config::NetworkConfig;
use crate::error::{ModelStoreError, Result};
use reqwest::blocking::Client;
use reqwest::header;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;
use tracing::debug;
use url::Url;

/// Opens a readable byte stream for a URL.
///
/// The returned reader is owned (and closed) by the caller.
pub trait StreamProvider: Send + Sync {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>>;
}

/// HTTP(S) transport backed by a blocking `reqwest` client.
pub struct HttpStreamProvider {
    client: Client,
}

impl HttpStreamProvider {
    /// Build a client with the default timeouts and headers.
    pub fn new() -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static(NetworkConfig::ACCEPT),
        );
        headers.insert(
            header::ACCEPT_ENCODING,
            header::HeaderValue::from_static(NetworkConfig::ACCEPT_ENCODING),
        );

        let client = Client::builder()
            .user_agent(NetworkConfig::USER_AGENT)
            .default_headers(headers)
            .connect_timeout(NetworkConfig::CONNECT_TIMEOUT)
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(NetworkConfig::MAX_REDIRECTS))
            .build()?;

        Ok(Self { client })
    }

    /// Use a pre-configured client (custom proxy, TLS roots, ...).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl StreamProvider for HttpStreamProvider {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>> {
        debug!("Opening HTTP stream for {}", url);
        let response = self.client.get(url).send()?;
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Err(ModelStoreError::Network {
                message: format!("HTTP {} when fetching {}", status.as_u16(), url),
                cause: status.canonical_reason().map(str::to_string),
            });
        }
        Ok(Box::new(response))
    }
}

/// Local-file transport for `file://` URLs and plain paths (sideloading).
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStreamProvider;

impl FileStreamProvider {
    fn resolve(url: &str) -> Result<PathBuf> {
        match Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "file" => {
                parsed.to_file_path().map_err(|_| ModelStoreError::Network {
                    message: format!("Invalid file URL: {}", url),
                    cause: None,
                })
            }
            _ => Ok(PathBuf::from(url)),
        }
    }
}

impl StreamProvider for FileStreamProvider {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>> {
        let path = Self::resolve(url)?;
        let file = File::open(&path).map_err(|e| ModelStoreError::io_with_path(e, &path))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Dispatches on the URL scheme: `http`/`https` go over the network,
/// `file` URLs and bare paths are read from disk.
pub struct DefaultStreamProvider {
    http: HttpStreamProvider,
    file: FileStreamProvider,
}

impl DefaultStreamProvider {
    pub fn new() -> Result<Self> {
        Ok(Self {
            http: HttpStreamProvider::new()?,
            file: FileStreamProvider,
        })
    }
}

impl StreamProvider for DefaultStreamProvider {
    fn open(&self, url: &str) -> Result<Box<dyn Read + Send>> {
        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => self.http.open(url),
            Ok(parsed) if parsed.scheme() == "file" => self.file.open(url),
            Ok(parsed) if parsed.scheme().len() > 1 => Err(ModelStoreError::Network {
                message: format!("Unsupported URL scheme '{}' in {}", parsed.scheme(), url),
                cause: None,
            }),
            // Bare paths (including Windows drive letters parsed as a scheme)
            _ => self.file.open(url),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_provider_reads_plain_path_and_file_url() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bundle.zip");
        std::fs::write(&path, b"payload").unwrap();

        let mut contents = Vec::new();
        FileStreamProvider
            .open(path.to_str().unwrap())
            .unwrap()
            .read_to_end(&mut contents)
            .unwrap();
        assert_eq!(contents, b"payload");

        let url = Url::from_file_path(&path).unwrap();
        let mut contents = Vec::new();
        FileStreamProvider
            .open(url.as_str())
            .unwrap()
            .read_to_end(&mut contents)
            .unwrap();
        assert_eq!(contents, b"payload");
    }

    #[test]
    fn test_file_provider_missing_file_is_io_error() {
        let err = FileStreamProvider
            .open("/definitely/not/here.zip")
            .err()
            .unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }

    #[test]
    fn test_default_provider_rejects_unknown_scheme() {
        let provider = DefaultStreamProvider::new().unwrap();
        let err = provider.open("ftp://example.com/model.zip").err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::Network);
    }
}
