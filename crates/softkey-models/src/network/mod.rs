//! Byte-stream transports used to fetch catalogs and model bundles.
//!
//! The store only needs `open(url) -> Read`; retries, proxies and caching
//! belong to the caller or to the transport implementation.

mod transport;

pub use transport::{DefaultStreamProvider, FileStreamProvider, HttpStreamProvider, StreamProvider};
