//! Filesystem transport over a project checkout.
//!
//! Serves the same answers the emulator server would: directory listings of
//! paths under the project root, and file contents. Route prefixes can be
//! mounted so that script sources like `ripple/extensions/plugins/...`
//! resolve to `plugins/...` under the root.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use extloader_shared::{ExtLoaderError, Result};

use crate::ResourceFetcher;

/// Reads listings and resources from a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalFetcher {
    root: PathBuf,
    mounts: Vec<String>,
}

impl LocalFetcher {
    /// Create a fetcher rooted at the project directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mounts: Vec::new(),
        }
    }

    /// Treat `prefix/<rest>` as `<rest>` relative to the root.
    pub fn mount(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into().trim_matches('/').to_string();
        if !prefix.is_empty() {
            self.mounts.push(prefix);
        }
        self
    }

    /// Map a request path onto the filesystem, refusing to leave the root.
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let mut rel = path.trim_start_matches('/');
        for prefix in &self.mounts {
            if let Some(rest) = rel.strip_prefix(prefix.as_str()) {
                if rest.is_empty() || rest.starts_with('/') {
                    rel = rest.trim_start_matches('/');
                    break;
                }
            }
        }

        let rel = Path::new(rel);
        if rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(ExtLoaderError::validation(format!(
                "path escapes project root: {path}"
            )));
        }

        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ResourceFetcher for LocalFetcher {
    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let dir = self.resolve(path)?;

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => {
                debug!(path = %dir.display(), "no such directory, listing as empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(ExtLoaderError::io(&dir, e)),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ExtLoaderError::io(&dir, e))?
        {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        // readdir order is platform-dependent; keep runs reproducible.
        names.sort();
        Ok(names)
    }

    async fn fetch(&self, path: &str) -> Result<Option<String>> {
        let file = self.resolve(path)?;

        match tokio::fs::read_to_string(&file).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ExtLoaderError::io(&file, e)),
        }
    }
}
