//! Request/response transport for extension discovery.
//!
//! Everything the loader learns about a project arrives through a
//! [`ResourceFetcher`]: directory listings (ordered child names) and the
//! textual content of single resources. Two implementations ship here:
//! [`HttpFetcher`] talks to a running emulator server, [`LocalFetcher`]
//! reads a project checkout directly.

mod http;
mod listing;
mod local;

use async_trait::async_trait;
use tracing::debug;

use extloader_shared::Result;

pub use http::{HttpFetcher, HttpFetcherOptions};
pub use listing::parse_listing;
pub use local::LocalFetcher;

// ---------------------------------------------------------------------------
// ResourceFetcher
// ---------------------------------------------------------------------------

/// Asynchronous access to directory listings and resource content.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Ordered child names of the directory at `path`.
    ///
    /// A missing directory is not an error: it lists as empty.
    async fn list(&self, path: &str) -> Result<Vec<String>>;

    /// Raw textual content of the resource at `path`, or `None` if absent.
    async fn fetch(&self, path: &str) -> Result<Option<String>>;
}

/// List `path`, folding transport failures into an empty listing.
///
/// Discovery never fails on a bad listing; it just finds nothing there.
pub async fn list_or_empty(fetcher: &dyn ResourceFetcher, path: &str) -> Vec<String> {
    match fetcher.list(path).await {
        Ok(names) => names,
        Err(e) => {
            debug!(%path, error = %e, "listing failed, treating as empty");
            Vec::new()
        }
    }
}
