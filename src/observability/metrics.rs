//! # Metrics Collection
//!
//! Prometheus counters for request outcomes and client lifecycle events.
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::errors::{Error, Result};

/// Records backend metrics through the global `metrics` recorder.
#[derive(Debug, Clone, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Create a new metrics recorder instance
    pub fn new() -> Self {
        Self
    }

    /// Record a handled request by path kind and outcome
    pub fn record_request(&self, path: &str, outcome: &str) {
        let labels = [("path", path.to_string()), ("outcome", outcome.to_string())];
        counter!("ccp_requests_total", &labels).increment(1);
    }

    /// Record a client build attempt
    pub fn record_client_build(&self, success: bool) {
        let result = if success { "success" } else { "error" };
        let labels = [("result", result.to_string())];
        counter!("ccp_client_builds_total", &labels).increment(1);
    }

    /// Record a replacement or drop of the cached client
    pub fn record_client_invalidation(&self, reason: &str) {
        let labels = [("reason", reason.to_string())];
        counter!("ccp_client_invalidations_total", &labels).increment(1);
    }
}

/// Install the Prometheus recorder and return the handle used to render it.
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::internal(format!("Failed to initialize metrics exporter: {}", e)))?;

    describe_counter!("ccp_requests_total", "Requests handled by path and outcome");
    describe_counter!("ccp_client_builds_total", "Credential provider client build attempts");
    describe_counter!(
        "ccp_client_invalidations_total",
        "Cached credential provider clients replaced or dropped"
    );

    info!("Prometheus metrics recorder installed");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        let recorder = MetricsRecorder::new();
        recorder.record_request("object", "success");
        recorder.record_client_build(false);
        recorder.record_client_invalidation("cleanup");
    }
}
