//! Application configuration for extloader.
//!
//! User config lives at `~/.extloader/extloader.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ExtLoaderError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "extloader.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".extloader";

// ---------------------------------------------------------------------------
// Config structs (matching extloader.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where plugin contributions live inside the host project.
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Server routes used to list directories and serve extension scripts.
    #[serde(default)]
    pub routes: RouteConfig,

    /// Transport settings.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Staged-load policy.
    #[serde(default)]
    pub loading: LoadingConfig,
}

/// `[layout]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Directory (relative to the project root) holding one folder per plugin.
    #[serde(default = "default_plugins_root")]
    pub plugins_root: String,

    /// Path below each plugin folder that holds its extension contributions.
    #[serde(default = "default_extension_subdir")]
    pub extension_subdir: String,

    /// Listing entry that marks a UI subtree.
    #[serde(default = "default_ui_marker")]
    pub ui_marker: String,

    /// Root listing entry that is not a plugin; alone it means "no contributions".
    #[serde(default = "default_sentinel")]
    pub no_contributions_sentinel: String,

    /// Project prefix stripped from stylesheet and markup paths before use.
    #[serde(default = "default_host_prefix")]
    pub host_prefix: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            plugins_root: default_plugins_root(),
            extension_subdir: default_extension_subdir(),
            ui_marker: default_ui_marker(),
            no_contributions_sentinel: default_sentinel(),
            host_prefix: default_host_prefix(),
        }
    }
}

fn default_plugins_root() -> String {
    "plugins".into()
}
fn default_extension_subdir() -> String {
    "src/ripple/emulator".into()
}
fn default_ui_marker() -> String {
    "ui".into()
}
fn default_sentinel() -> String {
    "ripple.json".into()
}
fn default_host_prefix() -> String {
    "platforms/ripple/www/".into()
}

/// `[routes]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Directory-listing route; `GET <directory>/<path>` returns `a/b/c`.
    #[serde(default = "default_directory_route")]
    pub directory: String,

    /// Route prefix for plain extension scripts.
    #[serde(default = "default_extensions_route")]
    pub extensions: String,

    /// Route prefix for UI extension scripts.
    #[serde(default = "default_ui_extensions_route")]
    pub ui_extensions: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            directory: default_directory_route(),
            extensions: default_extensions_route(),
            ui_extensions: default_ui_extensions_route(),
        }
    }
}

fn default_directory_route() -> String {
    "ripple/directory".into()
}
fn default_extensions_route() -> String {
    "ripple/extensions".into()
}
fn default_ui_extensions_route() -> String {
    "ripple/uiextensions".into()
}

/// `[transport]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Timeout for a single HTTP request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    10
}

/// `[loading]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadingConfig {
    /// Give up on a UI script whose load event has not fired after this many ms.
    /// Unset means wait forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_load_timeout_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// Load policy (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime staged-load policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadPolicy {
    /// `None` keeps the slot open until the load event fires.
    pub script_load_timeout: Option<Duration>,
}

impl From<&AppConfig> for LoadPolicy {
    fn from(config: &AppConfig) -> Self {
        Self {
            script_load_timeout: config
                .loading
                .script_load_timeout_ms
                .map(Duration::from_millis),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.extloader/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ExtLoaderError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.extloader/extloader.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ExtLoaderError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ExtLoaderError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ExtLoaderError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ExtLoaderError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ExtLoaderError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("plugins_root"));
        assert!(toml_str.contains("ripple/directory"));
        assert!(!toml_str.contains("script_load_timeout_ms"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.layout, LayoutConfig::default());
        assert_eq!(parsed.routes, RouteConfig::default());
        assert_eq!(parsed.transport.timeout_secs, 10);
    }

    #[test]
    fn partial_sections_fill_defaults() {
        let toml_str = r#"
[layout]
plugins_root = "www/plugins"

[loading]
script_load_timeout_ms = 2500
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.layout.plugins_root, "www/plugins");
        assert_eq!(config.layout.ui_marker, "ui");
        assert_eq!(config.routes.extensions, "ripple/extensions");

        let policy = LoadPolicy::from(&config);
        assert_eq!(policy.script_load_timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn load_policy_defaults_to_no_timeout() {
        let policy = LoadPolicy::from(&AppConfig::default());
        assert!(policy.script_load_timeout.is_none());
    }
}
