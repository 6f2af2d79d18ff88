//! # Observability Infrastructure
//!
//! Structured logging and metrics recording for the gateway core. The
//! pipeline is a pure producer here: it records counters and histograms
//! fire-and-forget; exporter wiring belongs to the embedding process.

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{init_metrics, MetricsRecorder};

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use ::tracing::info;

/// Initialize logging and metrics together.
pub fn init_observability(config: &ObservabilityConfig) -> Result<MetricsRecorder> {
    init_logging(config)?;

    if config.enable_metrics {
        init_metrics();
    }

    info!(
        service_name = %config.service_name,
        log_level = %config.log_level,
        metrics_enabled = %config.enable_metrics,
        "Observability initialized"
    );

    Ok(MetricsRecorder::new())
}
