//! # Metrics Collection
//!
//! Describes and records the gateway's request metrics. Only recording
//! lives here; installing an exporter is the embedding process's concern.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use once_cell::sync::OnceCell;

static DESCRIBED: OnceCell<()> = OnceCell::new();

/// Describe all gateway metrics so exporters can render help texts.
/// Descriptions are registered once per process.
pub fn init_metrics() {
    DESCRIBED.get_or_init(|| {
        describe_metrics();
    });
}

fn describe_metrics() {
    describe_counter!("gateway_requests_total", Unit::Count, "Requests entering the pipeline");
    describe_counter!(
        "gateway_interruptions_total",
        Unit::Count,
        "Requests deliberately interrupted by a policy or the security chain"
    );
    describe_counter!("gateway_faults_total", Unit::Count, "Requests failed by a policy fault");
    describe_counter!(
        "gateway_no_endpoint_total",
        Unit::Count,
        "Requests for which no backend endpoint could be resolved"
    );
    describe_histogram!(
        "gateway_request_duration_seconds",
        Unit::Seconds,
        "Wall-clock time spent in the request phases of the pipeline"
    );
}

/// Metrics recorder used by the pipeline, fire-and-forget.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record a request entering an API's pipeline.
    pub fn record_request(&self, api: &str) {
        let labels = [("api", api.to_string())];
        counter!("gateway_requests_total", &labels).increment(1);
    }

    /// Record a deliberate interruption and its failure key, if any.
    pub fn record_interruption(&self, api: &str, key: Option<&str>) {
        let labels =
            [("api", api.to_string()), ("key", key.unwrap_or("none").to_string())];
        counter!("gateway_interruptions_total", &labels).increment(1);
    }

    /// Record a policy or connector fault.
    pub fn record_fault(&self, api: &str) {
        let labels = [("api", api.to_string())];
        counter!("gateway_faults_total", &labels).increment(1);
    }

    /// Record a request with no resolvable backend endpoint.
    pub fn record_no_endpoint(&self, api: &str) {
        let labels = [("api", api.to_string())];
        counter!("gateway_no_endpoint_total", &labels).increment(1);
    }

    /// Record time spent executing the request phases.
    pub fn record_request_duration(&self, api: &str, seconds: f64) {
        let labels = [("api", api.to_string())];
        histogram!("gateway_request_duration_seconds", &labels).record(seconds);
    }
}
