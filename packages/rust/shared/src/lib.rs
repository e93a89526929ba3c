//! Shared types, error model, and configuration for extloader.
//!
//! This crate is the foundation depended on by all other extloader crates.
//! It provides:
//! - [`ExtLoaderError`], the unified error type
//! - Domain types ([`RunId`], [`HtmlDestination`], stage reports)
//! - Configuration ([`AppConfig`], [`LoadPolicy`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LayoutConfig, LoadPolicy, LoadingConfig, RouteConfig, TransportConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{ExtLoaderError, Result};
pub use types::{
    ExtensionReport, HtmlDestination, MarkupAsset, RunId, RunReport, StageOutput, StageRecord,
    UiReport, UiUnit, join_path, module_id,
};
