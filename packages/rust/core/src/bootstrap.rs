//! The standard two-stage bootstrap: plugin extensions, then plugin UI.

use tracing::{info, instrument};

use extloader_shared::{AppConfig, LoadPolicy, Result, RunId, RunReport};

use crate::extensions::ExtensionDiscoverer;
use crate::host::HostContext;
use crate::pipeline::{Pipeline, ProgressReporter};
use crate::ui::UiAssetLoader;

/// Build the extensions → UI assets pipeline for `config`.
pub fn standard_pipeline(config: &AppConfig, host: &HostContext) -> Pipeline {
    let policy = LoadPolicy::from(config);

    Pipeline::new()
        .stage(ExtensionDiscoverer::new(
            host.clone(),
            config.layout.clone(),
            config.routes.clone(),
            policy,
        ))
        .stage(UiAssetLoader::new(
            host.clone(),
            config.layout.clone(),
            config.routes.clone(),
            policy,
        ))
}

/// Run the standard pipeline once under a fresh [`RunId`].
#[instrument(skip_all)]
pub async fn run_bootstrap(
    config: &AppConfig,
    host: &HostContext,
    progress: &dyn ProgressReporter,
) -> Result<RunReport> {
    let run_id = RunId::new();
    let report = standard_pipeline(config, host)
        .run_as(run_id, progress)
        .await?;

    let plugins = report.extensions().map_or(0, |r| r.plugins.len());
    let modules = report.ui_assets().map_or(0, |r| r.modules.len());
    info!(%run_id, plugins, ui_modules = modules, "bootstrap complete");

    Ok(report)
}
