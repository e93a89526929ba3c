//! Plugin extension discovery.
//!
//! Files below `<plugins_root>/<plugin>/<extension_subdir>` behave as if they
//! were part of the emulator itself. This stage enumerates the plugin root,
//! lists every plugin's extension directory concurrently, injects the plain
//! scripts it finds, and initializes whatever modules those scripts
//! registered. Plugins whose extension directory contains the UI marker are
//! recorded for the UI asset stage.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use extloader_shared::{
    ExtLoaderError, ExtensionReport, LayoutConfig, LoadPolicy, RouteConfig, StageOutput,
    join_path, module_id,
};
use extloader_transport::list_or_empty;

use crate::barrier::PendingCount;
use crate::baton::Baton;
use crate::fanout::list_all;
use crate::host::{HostContext, ModuleRegistry};
use crate::pipeline::Stage;

/// Stage name used in logs and reports.
pub const STAGE_NAME: &str = "extensions";

// ---------------------------------------------------------------------------
// Subtree classification
// ---------------------------------------------------------------------------

/// What one plugin's extension directory contributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contribution {
    /// The directory contains the UI marker.
    pub has_ui: bool,
    /// Plain file names, marker excluded.
    pub files: Vec<String>,
}

/// Classify a plugin's extension-directory listing.
///
/// A listing that is exactly the UI marker contributes the UI subtree and no
/// files. A marker mixed with other names contributes both.
pub fn classify_subtree(names: &[String], ui_marker: &str) -> Contribution {
    let has_ui = names.iter().any(|n| n == ui_marker);
    if has_ui && names.len() == 1 {
        return Contribution {
            has_ui,
            files: Vec::new(),
        };
    }

    Contribution {
        has_ui,
        files: names
            .iter()
            .filter(|n| n.as_str() != ui_marker)
            .cloned()
            .collect(),
    }
}

/// Plugin ids from the root listing, with the "no contributions" sentinel removed.
pub fn plugin_ids(root: Vec<String>, sentinel: &str) -> Vec<String> {
    root.into_iter().filter(|name| name != sentinel).collect()
}

// ---------------------------------------------------------------------------
// ExtensionDiscoverer
// ---------------------------------------------------------------------------

/// First bootstrap stage: find and load plain plugin extension scripts.
pub struct ExtensionDiscoverer {
    host: HostContext,
    layout: LayoutConfig,
    routes: RouteConfig,
    policy: LoadPolicy,
}

impl ExtensionDiscoverer {
    pub fn new(
        host: HostContext,
        layout: LayoutConfig,
        routes: RouteConfig,
        policy: LoadPolicy,
    ) -> Self {
        Self {
            host,
            layout,
            routes,
            policy,
        }
    }

    /// Extension directory of one plugin, relative to the project root.
    fn plugin_dir(&self, plugin: &str) -> String {
        join_path(
            &join_path(&self.layout.plugins_root, plugin),
            &self.layout.extension_subdir,
        )
    }

    /// Run discovery and loading to completion.
    #[instrument(skip_all, fields(plugins_root = %self.layout.plugins_root))]
    pub async fn discover(&self) -> ExtensionReport {
        let root = list_or_empty(self.host.fetcher.as_ref(), &self.layout.plugins_root).await;
        let plugins = plugin_ids(root, &self.layout.no_contributions_sentinel);

        if plugins.is_empty() {
            info!("no plugin contributions found");
            return ExtensionReport::default();
        }

        let contributions = self.scan_plugins(&plugins).await;

        let mut report = ExtensionReport {
            plugins,
            ..Default::default()
        };
        for (dir, contribution) in contributions {
            if contribution.has_ui {
                report
                    .ui_directories
                    .push(join_path(&dir, &self.layout.ui_marker));
            }
            report
                .scripts
                .extend(contribution.files.iter().map(|f| join_path(&dir, f)));
        }
        report.modules = report.scripts.iter().map(|s| module_id(s)).collect();

        if !report.scripts.is_empty() {
            let (initialized, failed) = self.load_scripts(&report.scripts, &report.modules).await;
            report.initialized = initialized;
            report.init_failures = failed;
        }

        info!(
            plugins = report.plugins.len(),
            ui_directories = report.ui_directories.len(),
            scripts = report.scripts.len(),
            initialized = report.initialized,
            init_failures = report.init_failures,
            "plugin extensions loaded"
        );

        report
    }

    /// List every plugin's extension directory concurrently and classify it.
    async fn scan_plugins(&self, plugins: &[String]) -> Vec<(String, Contribution)> {
        let dirs: Vec<String> = plugins.iter().map(|p| self.plugin_dir(p)).collect();
        let listings = list_all(&self.host.fetcher, &dirs).await;

        dirs.into_iter()
            .zip(listings)
            .map(|(dir, names)| {
                let contribution = classify_subtree(&names, &self.layout.ui_marker);
                debug!(
                    %dir,
                    has_ui = contribution.has_ui,
                    files = contribution.files.len(),
                    "plugin extension directory classified"
                );
                (dir, contribution)
            })
            .collect()
    }

    /// Inject every script concurrently and initialize what registered.
    ///
    /// Returns `(initialized, failed)`.
    async fn load_scripts(&self, scripts: &[String], modules: &[String]) -> (usize, usize) {
        let pending = PendingCount::new(scripts.len());
        let tally = Arc::new(Mutex::new((0usize, 0usize)));

        for (path, module) in scripts.iter().zip(modules) {
            let slot = pending.slot();
            let injector = Arc::clone(&self.host.injector);
            let registry = Arc::clone(&self.host.modules);
            let tally = Arc::clone(&tally);
            let src = join_path(&self.routes.extensions, path);
            let path = path.clone();
            let module = module.clone();
            let timeout = self.policy.script_load_timeout;

            tokio::spawn(async move {
                let loaded = match timeout {
                    Some(limit) => tokio::time::timeout(limit, injector.inject_script(&src))
                        .await
                        .unwrap_or_else(|_| {
                            Err(ExtLoaderError::Load(format!("no load event within {limit:?}")))
                        }),
                    None => injector.inject_script(&src).await,
                };

                let outcome = match loaded {
                    Ok(()) => initialize_module(registry.as_ref(), &module, &path),
                    Err(e) => {
                        warn!(%src, error = %e, "extension script failed to load");
                        InitOutcome::Failed
                    }
                };

                {
                    let mut tally = tally.lock().await;
                    match outcome {
                        InitOutcome::Initialized => tally.0 += 1,
                        InitOutcome::Failed => tally.1 += 1,
                        InitOutcome::Absent => {}
                    }
                }
                slot.release();
            });
        }

        pending.wait().await;
        *tally.lock().await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitOutcome {
    Initialized,
    Absent,
    Failed,
}

/// Resolve a loaded script's module and run its initializer, if it has one.
fn initialize_module(registry: &dyn ModuleRegistry, module: &str, path: &str) -> InitOutcome {
    let Some(instance) = registry.resolve(module) else {
        debug!(%module, %path, "no self-registered module, nothing to initialize");
        return InitOutcome::Absent;
    };

    match catch_unwind(AssertUnwindSafe(|| instance.initialize())) {
        Ok(Ok(())) => {
            info!(%module, %path, "initialized plugin extension");
            InitOutcome::Initialized
        }
        Ok(Err(e)) => {
            warn!(%module, %path, error = %e, "error initializing plugin extension");
            InitOutcome::Failed
        }
        Err(_) => {
            warn!(%module, %path, "plugin extension panicked during initialization");
            InitOutcome::Failed
        }
    }
}

#[async_trait]
impl Stage for ExtensionDiscoverer {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn initialize(&self, _previous: &StageOutput, mut baton: Baton) {
        baton.take();
        let report = self.discover().await;
        baton.pass(StageOutput::Extensions(report));
    }
}
