//! Interfaces to the host document the loader injects into.
//!
//! The loader never touches a document directly. It asks a
//! [`ResourceInjector`] to load scripts and stylesheets, a [`DocumentHost`]
//! to attach markup to one of the named containers, and a [`ModuleRegistry`]
//! to find modules that loaded scripts registered themselves under.

mod headless;

use std::sync::Arc;

use async_trait::async_trait;

use extloader_shared::{HtmlDestination, Result};
use extloader_transport::ResourceFetcher;

pub use headless::HeadlessHost;

/// A module a loaded script registered under its derived identifier.
pub trait ExtensionModule: Send + Sync {
    /// Run the module's self-initialization.
    fn initialize(&self) -> Result<()>;
}

/// Name → module lookup, populated when scripts self-register.
pub trait ModuleRegistry: Send + Sync {
    /// The module registered under `id`. Absence is a normal outcome.
    fn resolve(&self, id: &str) -> Option<Arc<dyn ExtensionModule>>;
}

/// Loads script and stylesheet resources into the host.
#[async_trait]
pub trait ResourceInjector: Send + Sync {
    /// Inject a script. Resolves when its load event fires; an `Err` is a
    /// reported load failure. A script whose load event never fires never
    /// resolves.
    async fn inject_script(&self, src: &str) -> Result<()>;

    /// Inject a stylesheet. Resolves on its load event or load failure.
    async fn inject_stylesheet(&self, href: &str) -> Result<()>;
}

/// The three named insertion points of the host document.
#[async_trait]
pub trait DocumentHost: Send + Sync {
    /// Append `markup` to the container for `destination`. Resolves once the
    /// container's mutation notification has fired.
    async fn insert_markup(&self, destination: HtmlDestination, markup: &str) -> Result<()>;
}

/// Everything a stage needs from the outside world.
#[derive(Clone)]
pub struct HostContext {
    pub fetcher: Arc<dyn ResourceFetcher>,
    pub injector: Arc<dyn ResourceInjector>,
    pub document: Arc<dyn DocumentHost>,
    pub modules: Arc<dyn ModuleRegistry>,
}

impl HostContext {
    /// Use one [`HeadlessHost`] for injection, insertion, and module lookup.
    pub fn headless(fetcher: Arc<dyn ResourceFetcher>, host: Arc<HeadlessHost>) -> Self {
        Self {
            fetcher,
            injector: host.clone(),
            document: host.clone(),
            modules: host,
        }
    }
}
