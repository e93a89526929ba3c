//! HTTP transport against a running emulator server.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};
use url::Url;

use extloader_shared::{ExtLoaderError, Result, RouteConfig, join_path};

use crate::ResourceFetcher;
use crate::listing::parse_listing;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 3;

/// Default timeout in seconds for a single request.
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// User-Agent string for transport requests.
const USER_AGENT: &str = concat!("extloader/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for the HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpFetcherOptions {
    /// Timeout for HTTP requests in seconds.
    pub timeout_secs: u64,
    /// Route that serves directory listings.
    pub directory_route: String,
}

impl Default for HttpFetcherOptions {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            directory_route: RouteConfig::default().directory,
        }
    }
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// Fetches listings and resources relative to a server base URL.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base: Url,
    directory_route: String,
}

impl HttpFetcher {
    /// Create a fetcher rooted at `base` (e.g. `http://localhost:4400/`).
    pub fn new(base: Url, opts: &HttpFetcherOptions) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(ExtLoaderError::validation(format!(
                "not a usable base URL: {base}"
            )));
        }

        Ok(Self {
            client: build_client(opts)?,
            base: with_trailing_slash(base),
            directory_route: opts.directory_route.clone(),
        })
    }

    /// Absolute URL for a server-relative path.
    fn url_for(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ExtLoaderError::validation(format!("bad resource path '{path}': {e}")))
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    #[instrument(skip(self))]
    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let route = join_path(&self.directory_route, path);
        let body = self.fetch(&route).await?;
        Ok(body.as_deref().map(parse_listing).unwrap_or_default())
    }

    async fn fetch(&self, path: &str) -> Result<Option<String>> {
        let url = self.url_for(path)?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ExtLoaderError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(%url, "resource not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ExtLoaderError::Network(format!("{url}: HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ExtLoaderError::Network(format!("{url}: failed to read body: {e}")))?;

        Ok(Some(body))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with appropriate settings.
fn build_client(opts: &HttpFetcherOptions) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .timeout(Duration::from_secs(opts.timeout_secs))
        .build()
        .map_err(|e| ExtLoaderError::Network(format!("failed to build HTTP client: {e}")))
}

/// `Url::join` replaces the last segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
