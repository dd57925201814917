//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Default filter used when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,tessera=debug,tessera_renderer=debug,tessera_rhi=debug";

/// Initialize the logging system with tracing.
///
/// Filtering comes from `RUST_LOG` when set. Validation layer output is routed
/// through the same subscriber by the debug messenger.
///
/// # Example
/// ```
/// tessera_core::init_logging();
/// tracing::info!("Renderer initialized");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}
