//! Plugin UI asset loading.
//!
//! Each UI directory found by extension discovery holds components: a
//! `<name>.js` script and/or a like-named asset directory. The asset
//! directory may carry one stylesheet and one markup file whose name
//! (`panel.html`, `overlay.html`, `dialog.html`) picks the container it is
//! inserted into. Anything else in there, such as images, is ignored.
//!
//! Loading happens in three phases that race each other:
//!
//! 1. stylesheets are injected; a failed stylesheet still counts as done
//! 2. markup is fetched and attached to its container; the slot is held
//!    until the container reports the mutation
//! 3. component scripts are injected; only the load event counts
//!
//! One [`PendingCount`] sized to the sum of all three gates the baton.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use extloader_shared::{
    ExtLoaderError, HtmlDestination, LayoutConfig, LoadPolicy, MarkupAsset, RouteConfig,
    StageOutput, UiReport, UiUnit, join_path, module_id,
};

use crate::barrier::PendingCount;
use crate::baton::Baton;
use crate::fanout::list_all;
use crate::host::HostContext;
use crate::pipeline::Stage;

/// Stage name used in logs and reports.
pub const STAGE_NAME: &str = "ui-assets";

// ---------------------------------------------------------------------------
// Listing classification
// ---------------------------------------------------------------------------

/// Contents of one UI directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiListing {
    /// Component scripts (`*.js`), relative to the project root.
    pub scripts: Vec<String>,
    /// Candidate asset directories (everything that is not a script).
    pub asset_dirs: Vec<String>,
    /// Components, pairing `name.js` with `name/`.
    pub units: Vec<UiUnit>,
}

/// Split a UI directory listing into scripts and candidate asset directories.
pub fn classify_ui_listing(ui_dir: &str, names: &[String]) -> UiListing {
    let mut listing = UiListing::default();

    for name in names {
        let path = join_path(ui_dir, name);
        let component = name.strip_suffix(".js").unwrap_or(name);

        let index = match listing.units.iter().position(|u| u.name == component) {
            Some(index) => index,
            None => {
                listing.units.push(UiUnit {
                    name: component.to_string(),
                    ui_directory: ui_dir.to_string(),
                    script: None,
                    asset_directory: None,
                });
                listing.units.len() - 1
            }
        };

        if name.ends_with(".js") {
            listing.units[index].script = Some(path.clone());
            listing.scripts.push(path);
        } else {
            listing.units[index].asset_directory = Some(path.clone());
            listing.asset_dirs.push(path);
        }
    }

    listing
}

/// Stylesheets and markup found in asset directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetListing {
    pub stylesheets: Vec<String>,
    pub markup: Vec<String>,
}

impl AssetListing {
    /// Add one asset directory's listing. Unrecognized entries are ignored.
    pub fn absorb(&mut self, dir: &str, names: &[String]) {
        for name in names {
            if name.ends_with(".css") {
                self.stylesheets.push(join_path(dir, name));
            } else if name.ends_with(".html") {
                self.markup.push(join_path(dir, name));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// UiAssetLoader
// ---------------------------------------------------------------------------

/// Second bootstrap stage: discover and load plugin UI components.
pub struct UiAssetLoader {
    host: HostContext,
    layout: LayoutConfig,
    routes: RouteConfig,
    policy: LoadPolicy,
}

impl UiAssetLoader {
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

    /// Discover and load the components under every UI directory.
    #[instrument(skip_all, fields(ui_directories = ui_dirs.len()))]
    pub async fn load(&self, ui_dirs: &[String]) -> UiReport {
        if ui_dirs.is_empty() {
            info!("no plugin UI to load");
            return UiReport::default();
        }

        let mut scripts = Vec::new();
        let mut asset_dirs = Vec::new();
        let mut units = Vec::new();
        let listings = list_all(&self.host.fetcher, ui_dirs).await;
        for (dir, names) in ui_dirs.iter().zip(listings) {
            let listing = classify_ui_listing(dir, &names);
            scripts.extend(listing.scripts);
            asset_dirs.extend(listing.asset_dirs);
            units.extend(listing.units);
        }

        let mut assets = AssetListing::default();
        let listings = list_all(&self.host.fetcher, &asset_dirs).await;
        for (dir, names) in asset_dirs.iter().zip(listings) {
            assets.absorb(dir, &names);
        }

        debug!(
            scripts = scripts.len(),
            stylesheets = assets.stylesheets.len(),
            markup = assets.markup.len(),
            "plugin UI discovered"
        );

        let report = self.staged_load(scripts, units, assets).await;

        info!(
            modules = report.modules.len(),
            stylesheets = report.stylesheets.len(),
            markup = report.markup.len(),
            dropped = report.dropped.len(),
            timed_out = report.timed_out,
            "plugin UI loaded"
        );

        report
    }

    /// Stylesheet and markup paths are requested relative to the project,
    /// not the host checkout.
    fn project_path(&self, path: &str) -> String {
        if self.layout.host_prefix.is_empty() {
            return path.to_string();
        }
        path.replacen(&self.layout.host_prefix, "", 1)
    }

    async fn staged_load(
        &self,
        scripts: Vec<String>,
        units: Vec<UiUnit>,
        assets: AssetListing,
    ) -> UiReport {
        let total = assets.stylesheets.len() + assets.markup.len() + scripts.len();
        let pending = PendingCount::new(total);
        let loaded = Arc::new(Mutex::new(UiReport::default()));

        // Phase A: styles never stall the pipeline.
        for css in &assets.stylesheets {
            let slot = pending.slot();
            let injector = Arc::clone(&self.host.injector);
            let loaded = Arc::clone(&loaded);
            let href = self.project_path(css);

            tokio::spawn(async move {
                let _done = slot;
                match injector.inject_stylesheet(&href).await {
                    Ok(()) => loaded.lock().await.stylesheets.push(href),
                    Err(e) => warn!(%href, error = %e, "error loading UI extension stylesheet"),
                }
            });
        }

        // Phase B: markup into its container.
        for html in &assets.markup {
            let slot = pending.slot();
            let fetcher = Arc::clone(&self.host.fetcher);
            let document = Arc::clone(&self.host.document);
            let loaded = Arc::clone(&loaded);
            let path = self.project_path(html);

            tokio::spawn(async move {
                let _done = slot;

                // Destination comes from the filename alone, so unknown markup is never fetched.
                let Some(destination) = HtmlDestination::classify(&path) else {
                    warn!(%path, "unknown UI extension html file, dropping it");
                    loaded.lock().await.dropped.push(path);
                    return;
                };

                let attached = match fetcher.fetch(&path).await {
                    Ok(Some(markup)) => document.insert_markup(destination, &markup).await,
                    Ok(None) => Err(ExtLoaderError::Load("markup not found".into())),
                    Err(e) => Err(e),
                };

                let mut loaded = loaded.lock().await;
                match attached {
                    Ok(()) => {
                        debug!(%path, container = destination.container_id(), "UI markup attached");
                        loaded.markup.push(MarkupAsset { path, destination });
                    }
                    Err(e) => {
                        warn!(%path, error = %e, "error appending UI extension html");
                        loaded.dropped.push(path);
                    }
                }
            });
        }

        // Phase C: component scripts, counted on their load event.
        let mut modules = Vec::with_capacity(scripts.len());
        for script in &scripts {
            modules.push(module_id(script));

            let slot = pending.slot();
            let injector = Arc::clone(&self.host.injector);
            let loaded = Arc::clone(&loaded);
            let src = join_path(&self.routes.ui_extensions, script);
            let timeout = self.policy.script_load_timeout;

            tokio::spawn(async move {
                let _done = slot;
                let result = match timeout {
                    Some(limit) => {
                        let load = tokio::time::timeout(limit, injector.inject_script(&src));
                        match load.await {
                            Ok(result) => result,
                            Err(_) => {
                                warn!(%src, ?limit, "UI extension script never loaded, giving up");
                                loaded.lock().await.timed_out += 1;
                                return;
                            }
                        }
                    }
                    None => injector.inject_script(&src).await,
                };
                if let Err(e) = result {
                    warn!(%src, error = %e, "UI extension script reported a load failure");
                }
            });
        }

        pending.wait().await;

        let mut report = std::mem::take(&mut *loaded.lock().await);
        report.modules = modules;
        report.units = units;
        report
    }
}

#[async_trait]
impl Stage for UiAssetLoader {
    fn name(&self) -> &str {
        STAGE_NAME
    }

    async fn initialize(&self, previous: &StageOutput, mut baton: Baton) {
        baton.take();
        let report = self.load(previous.ui_directories()).await;
        baton.pass(StageOutput::UiAssets(report));
    }
}
