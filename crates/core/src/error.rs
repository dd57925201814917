//! Error types shared by the tessera crates.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised outside the Vulkan layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Window creation or management errors
    #[error("Window error: {0}")]
    Window(String),

    /// Vulkan surface or extension negotiation errors
    #[error("Surface error: {0}")]
    Surface(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A config file could not be parsed.
    #[error("Failed to parse config '{path}': {source}")]
    ConfigParse {
        /// Path to the offending file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A config value is out of range.
    #[error("Config error: {0}")]
    Config(String),
}

/// Result type alias using the core Error type.
pub type Result<T> = std::result::Result<T, Error>;
