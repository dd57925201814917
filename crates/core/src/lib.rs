//! Core utilities shared by the tessera crates.
//!
//! - Error types and result aliases
//! - Logging initialization
//! - Timer utilities
//! - Renderer configuration

mod config;
mod error;
mod logging;
mod timer;

pub use config::{
    DEFAULT_CONFIG_FILE, ENV_FRAMES_IN_FLIGHT, ENV_VALIDATION, MAX_FRAMES_IN_FLIGHT,
    RendererConfig,
};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use timer::Timer;
