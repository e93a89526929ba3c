//! Scripted collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use extloader_shared::{ExtLoaderError, HtmlDestination, Result};
use extloader_transport::ResourceFetcher;

use crate::host::{DocumentHost, ExtensionModule, HostContext, ModuleRegistry, ResourceInjector};

// ---------------------------------------------------------------------------
// ScriptedFetcher
// ---------------------------------------------------------------------------

/// Answers listings and fetches from tables, with optional per-path delays
/// so responses arrive out of request order.
#[derive(Default)]
pub(crate) struct ScriptedFetcher {
    listings: HashMap<String, Vec<String>>,
    contents: HashMap<String, String>,
    failing: HashSet<String>,
    delays: HashMap<String, Duration>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub(crate) fn listing(mut self, path: &str, names: &[&str]) -> Self {
        self.listings
            .insert(path.to_string(), names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub(crate) fn content(mut self, path: &str, body: &str) -> Self {
        self.contents.insert(path.to_string(), body.to_string());
        self
    }

    pub(crate) fn fail(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    pub(crate) fn delay(mut self, path: &str, ms: u64) -> Self {
        self.delays.insert(path.to_string(), Duration::from_millis(ms));
        self
    }

    /// Every request seen, as `list:<path>` or `fetch:<path>`.
    pub(crate) fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.requests().iter().filter(|r| r.starts_with(prefix)).count()
    }

    async fn answer(&self, kind: &str, path: &str) -> Result<()> {
        self.requests.lock().unwrap().push(format!("{kind}:{path}"));
        if let Some(delay) = self.delays.get(path) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing.contains(path) {
            return Err(ExtLoaderError::Network(format!("{path}: HTTP 500")));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceFetcher for ScriptedFetcher {
    async fn list(&self, path: &str) -> Result<Vec<String>> {
        self.answer("list", path).await?;
        Ok(self.listings.get(path).cloned().unwrap_or_default())
    }

    async fn fetch(&self, path: &str) -> Result<Option<String>> {
        self.answer("fetch", path).await?;
        Ok(self.contents.get(path).cloned())
    }
}

// ---------------------------------------------------------------------------
// RecordingHost
// ---------------------------------------------------------------------------

/// Injector, document, and registry that record every call.
#[derive(Default)]
pub(crate) struct RecordingHost {
    pub(crate) scripts: Mutex<Vec<String>>,
    pub(crate) stylesheets: Mutex<Vec<String>>,
    pub(crate) markup: Mutex<Vec<(HtmlDestination, String)>>,
    stalled_scripts: HashSet<String>,
    failing_scripts: HashSet<String>,
    failing_stylesheets: HashSet<String>,
    failing_inserts: bool,
    delays: HashMap<String, Duration>,
    modules: HashMap<String, Arc<dyn ExtensionModule>>,
}

impl RecordingHost {
    /// The load event for `src` never fires.
    pub(crate) fn stall_script(mut self, src: &str) -> Self {
        self.stalled_scripts.insert(src.to_string());
        self
    }

    pub(crate) fn fail_script(mut self, src: &str) -> Self {
        self.failing_scripts.insert(src.to_string());
        self
    }

    pub(crate) fn fail_stylesheet(mut self, href: &str) -> Self {
        self.failing_stylesheets.insert(href.to_string());
        self
    }

    pub(crate) fn fail_inserts(mut self) -> Self {
        self.failing_inserts = true;
        self
    }

    /// Delay a script or stylesheet load, or a container mutation when
    /// keyed by container id.
    pub(crate) fn delay(mut self, src: &str, ms: u64) -> Self {
        self.delays.insert(src.to_string(), Duration::from_millis(ms));
        self
    }

    pub(crate) fn module(mut self, id: &str, module: Arc<dyn ExtensionModule>) -> Self {
        self.modules.insert(id.to_string(), module);
        self
    }

    pub(crate) fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }

    pub(crate) fn stylesheets(&self) -> Vec<String> {
        self.stylesheets.lock().unwrap().clone()
    }

    pub(crate) fn markup(&self) -> Vec<(HtmlDestination, String)> {
        self.markup.lock().unwrap().clone()
    }

    async fn pause(&self, src: &str) {
        if let Some(delay) = self.delays.get(src) {
            tokio::time::sleep(*delay).await;
        }
    }
}

#[async_trait]
impl ResourceInjector for RecordingHost {
    async fn inject_script(&self, src: &str) -> Result<()> {
        self.scripts.lock().unwrap().push(src.to_string());
        if self.stalled_scripts.contains(src) {
            std::future::pending::<()>().await;
        }
        self.pause(src).await;
        if self.failing_scripts.contains(src) {
            return Err(ExtLoaderError::Load(format!("{src}: 404")));
        }
        Ok(())
    }

    async fn inject_stylesheet(&self, href: &str) -> Result<()> {
        self.stylesheets.lock().unwrap().push(href.to_string());
        self.pause(href).await;
        if self.failing_stylesheets.contains(href) {
            return Err(ExtLoaderError::Load(format!("{href}: parse error")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentHost for RecordingHost {
    async fn insert_markup(&self, destination: HtmlDestination, markup: &str) -> Result<()> {
        if self.failing_inserts {
            return Err(ExtLoaderError::Load("container rejected markup".into()));
        }
        self.pause(destination.container_id()).await;
        self.markup
            .lock()
            .unwrap()
            .push((destination, markup.to_string()));
        Ok(())
    }
}

impl ModuleRegistry for RecordingHost {
    fn resolve(&self, id: &str) -> Option<Arc<dyn ExtensionModule>> {
        self.modules.get(id).cloned()
    }
}

/// Wire a fetcher and a recording host into a [`HostContext`].
pub(crate) fn context(fetcher: Arc<ScriptedFetcher>, host: Arc<RecordingHost>) -> HostContext {
    HostContext {
        fetcher,
        injector: host.clone(),
        document: host.clone(),
        modules: host,
    }
}

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

/// Counts initializations; optionally fails them.
#[derive(Default)]
pub(crate) struct CountingModule {
    pub(crate) calls: AtomicUsize,
    pub(crate) fail: bool,
}

impl CountingModule {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ExtensionModule for CountingModule {
    fn initialize(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ExtLoaderError::Module("geolocation unavailable".into()));
        }
        Ok(())
    }
}

/// Panics during initialization.
pub(crate) struct PanickingModule;

impl ExtensionModule for PanickingModule {
    fn initialize(&self) -> Result<()> {
        panic!("extension initializer panicked");
    }
}
