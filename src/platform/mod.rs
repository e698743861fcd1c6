//! Platform seam: asynchronous URL fetches and synchronous local reads.
//!
//! The resolver is written against this trait so tests can substitute a
//! deterministic in-memory platform. [`HttpPlatform`] is the default
//! desktop implementation.

mod http;

pub use http::HttpPlatform;

use anyhow::Result;

use crate::core::SceneUrl;

/// Callback delivering the body of a URL request.
///
/// Fires exactly once, possibly from another thread. `None` signals
/// failure.
pub type FetchCallback = Box<dyn FnOnce(Option<Vec<u8>>) + Send + 'static>;

/// Host environment the resolver runs against.
pub trait Platform: Send + Sync {
    /// Begin an asynchronous fetch of `url`.
    fn start_url_request(&self, url: &SceneUrl, callback: FetchCallback);

    /// Synchronously read a local file.
    fn bytes_from_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Synchronously read a local file as text.
    fn string_from_file(&self, path: &str) -> Result<String> {
        let bytes = self.bytes_from_file(path)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Rewrite a still-relative data-source URL into a platform path.
    fn resolve_asset_path(&self, path: &str) -> String {
        path.to_string()
    }
}
