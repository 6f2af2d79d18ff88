//! # Structured Logging
//!
//! Sets up the tracing subscriber for the gateway process. `RUST_LOG`
//! takes precedence over the configured base level, so operators can raise
//! verbosity per module without touching configuration.

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once: a subscriber already being installed (e.g.
/// by a test harness) is not an error.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if config.json_logs {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed, keeping the existing one");
    }

    Ok(())
}
