//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use extloader_core::{HeadlessHost, HostContext, ProgressReporter, run_bootstrap};
use extloader_shared::{
    AppConfig, HtmlDestination, RunReport, init_config, load_config, load_config_from,
};
use extloader_transport::{HttpFetcher, HttpFetcherOptions, LocalFetcher, ResourceFetcher};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// extloader: discover and load plugin extensions and plugin UI.
#[derive(Parser)]
#[command(
    name = "extloader",
    version,
    about = "Discover plugin extensions and UI components and load them in stages.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.extloader/extloader.toml.
    #[arg(long, global = true, env = "EXTLOADER_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the extension and UI bootstrap against a project.
    Run {
        /// Base URL of an emulator server exposing the listing routes.
        #[arg(long, conflicts_with = "root", required_unless_present = "root")]
        url: Option<String>,

        /// Project checkout to read from directly.
        #[arg(long)]
        root: Option<PathBuf>,

        /// Print the run report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "extloader=info",
        1 => "extloader=debug",
        _ => "extloader=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    // Logs go to stderr so `run --json` output stays parseable.
    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run { url, root, json } => {
            let config = resolve_config(config_path)?;
            cmd_run(&config, url.as_deref(), root.as_deref(), json).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

/// Pick the transport for `--url` or `--root`.
fn build_fetcher(
    config: &AppConfig,
    url: Option<&str>,
    root: Option<&Path>,
) -> Result<Arc<dyn ResourceFetcher>> {
    match (url, root) {
        (Some(url), _) => {
            let base = Url::parse(url).map_err(|e| eyre!("invalid URL '{url}': {e}"))?;
            let opts = HttpFetcherOptions {
                timeout_secs: config.transport.timeout_secs,
                directory_route: config.routes.directory.clone(),
            };
            Ok(Arc::new(HttpFetcher::new(base, &opts)?))
        }
        (None, Some(root)) => {
            if !root.is_dir() {
                return Err(eyre!("project root '{}' is not a directory", root.display()));
            }
            let fetcher = LocalFetcher::new(root)
                .mount(config.routes.extensions.clone())
                .mount(config.routes.ui_extensions.clone());
            Ok(Arc::new(fetcher))
        }
        (None, None) => Err(eyre!("either --url or --root is required")),
    }
}

async fn cmd_run(
    config: &AppConfig,
    url: Option<&str>,
    root: Option<&Path>,
    json: bool,
) -> Result<()> {
    let fetcher = build_fetcher(config, url, root)?;
    let host = Arc::new(HeadlessHost::new(Arc::clone(&fetcher)));
    let context = HostContext::headless(fetcher, Arc::clone(&host));

    info!(source = url.unwrap_or("local checkout"), "starting bootstrap");

    let reporter = CliProgress::new(json);
    let report = run_bootstrap(config, &context, &reporter).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, &host);
    }

    Ok(())
}

fn print_summary(report: &RunReport, host: &HeadlessHost) {
    let elapsed = report.finished_at - report.started_at;

    println!();
    println!("  Bootstrap complete");
    println!("  Run:        {}", report.run_id);
    if let Some(ext) = report.extensions() {
        println!("  Plugins:    {}", ext.plugins.len());
        println!("  Scripts:    {}", ext.scripts.len());
        println!(
            "  Init:       {} ok, {} failed",
            ext.initialized, ext.init_failures
        );
    }
    if let Some(ui) = report.ui_assets() {
        println!("  UI modules: {}", ui.modules.len());
        println!("  Styles:     {}", ui.stylesheets.len());
        println!("  Markup:     {}", ui.markup.len());
        println!("  Containers: {}", container_summary(host));
        if !ui.dropped.is_empty() {
            println!("  Dropped:    {}", ui.dropped.join(", "));
        }
        if ui.timed_out > 0 {
            println!("  Timed out:  {}", ui.timed_out);
        }
    }
    println!(
        "  Time:       {:.1}s",
        elapsed.num_milliseconds() as f64 / 1000.0
    );
    println!();
}

/// Fragments attached to each host container, e.g. `panel-views=1, ...`.
fn container_summary(host: &HeadlessHost) -> String {
    HtmlDestination::ALL
        .iter()
        .map(|d| format!("{}={}", d.container_id(), host.container(*d).len()))
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new(hidden: bool) -> Self {
        if hidden {
            return Self {
                spinner: ProgressBar::hidden(),
            };
        }

        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, name: &str, index: usize, total: usize) {
        self.spinner
            .set_message(format!("[{}/{total}] {name}", index + 1));
    }

    fn stage_passed(&self, name: &str) {
        self.spinner.println(format!("  ✓ {name}"));
    }

    fn done(&self, _report: &RunReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
