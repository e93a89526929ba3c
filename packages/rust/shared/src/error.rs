//! Error types for extloader.
//!
//! Library crates use [`ExtLoaderError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all extloader operations.
#[derive(Debug, thiserror::Error)]
pub enum ExtLoaderError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while fetching a listing or resource.
    #[error("network error: {0}")]
    Network(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad path, bad base URL, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A script, stylesheet, or markup resource failed to load into the host.
    #[error("load error: {0}")]
    Load(String),

    /// A self-registered module failed during initialization.
    #[error("module error: {0}")]
    Module(String),

    /// Stage sequencing error (e.g. a stage gave up its baton without passing it).
    #[error("pipeline error: {0}")]
    Pipeline(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ExtLoaderError>;

impl ExtLoaderError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
