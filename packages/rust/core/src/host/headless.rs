//! In-process host with no script engine.
//!
//! "Loading" a script or stylesheet means fetching it through the transport:
//! present resources load, missing ones fail. Markup is appended to
//! per-container buffers. Modules only exist if registered explicitly, so
//! scripts loaded here resolve to nothing unless a caller provides one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use extloader_shared::{ExtLoaderError, HtmlDestination, Result};
use extloader_transport::ResourceFetcher;

use super::{DocumentHost, ExtensionModule, ModuleRegistry, ResourceInjector};

#[derive(Default)]
struct Document {
    scripts: Vec<String>,
    stylesheets: Vec<String>,
    containers: HashMap<HtmlDestination, Vec<String>>,
}

/// Headless stand-in for a browser document.
pub struct HeadlessHost {
    fetcher: Arc<dyn ResourceFetcher>,
    document: Mutex<Document>,
    modules: Mutex<HashMap<String, Arc<dyn ExtensionModule>>>,
    mutations: watch::Sender<u64>,
}

impl HeadlessHost {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        let (mutations, _) = watch::channel(0);
        Self {
            fetcher,
            document: Mutex::new(Document::default()),
            modules: Mutex::new(HashMap::new()),
            mutations,
        }
    }

    /// Register a module under `id`, as a loaded script would.
    pub fn register(&self, id: impl Into<String>, module: Arc<dyn ExtensionModule>) {
        lock(&self.modules).insert(id.into(), module);
    }

    /// Script sources loaded so far, in load order.
    pub fn scripts(&self) -> Vec<String> {
        lock(&self.document).scripts.clone()
    }

    /// Stylesheet hrefs loaded so far, in load order.
    pub fn stylesheets(&self) -> Vec<String> {
        lock(&self.document).stylesheets.clone()
    }

    /// Markup fragments attached to a container, in insertion order.
    pub fn container(&self, destination: HtmlDestination) -> Vec<String> {
        lock(&self.document)
            .containers
            .get(&destination)
            .cloned()
            .unwrap_or_default()
    }

    async fn load(&self, kind: &str, src: &str) -> Result<()> {
        match self.fetcher.fetch(src).await? {
            Some(_) => Ok(()),
            None => Err(ExtLoaderError::Load(format!("{kind} not found: {src}"))),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl ResourceInjector for HeadlessHost {
    async fn inject_script(&self, src: &str) -> Result<()> {
        self.load("script", src).await?;
        lock(&self.document).scripts.push(src.to_string());
        debug!(%src, "script loaded");
        Ok(())
    }

    async fn inject_stylesheet(&self, href: &str) -> Result<()> {
        self.load("stylesheet", href).await?;
        lock(&self.document).stylesheets.push(href.to_string());
        debug!(%href, "stylesheet loaded");
        Ok(())
    }
}

#[async_trait]
impl DocumentHost for HeadlessHost {
    async fn insert_markup(&self, destination: HtmlDestination, markup: &str) -> Result<()> {
        let mut rx = self.mutations.subscribe();
        let seen = *rx.borrow_and_update();

        lock(&self.document)
            .containers
            .entry(destination)
            .or_default()
            .push(markup.to_string());
        self.mutations.send_modify(|n| *n += 1);

        rx.wait_for(|n| *n > seen)
            .await
            .map_err(|e| ExtLoaderError::Load(format!("mutation notification lost: {e}")))?;
        debug!(container = destination.container_id(), "markup attached");
        Ok(())
    }
}

impl ModuleRegistry for HeadlessHost {
    fn resolve(&self, id: &str) -> Option<Arc<dyn ExtensionModule>> {
        lock(&self.modules).get(id).cloned()
    }
}
