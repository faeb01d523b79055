//! # Observability Infrastructure
//!
//! Structured logging and Prometheus metrics for the backend and its
//! development host.

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::{init_metrics, MetricsRecorder};

use metrics_exporter_prometheus::PrometheusHandle;
use tracing::info;

use crate::config::Settings;
use crate::errors::Result;

/// Initialize logging and, when enabled, the metrics recorder.
pub fn init_observability(settings: &Settings) -> Result<Option<PrometheusHandle>> {
    init_logging(&settings.log_level, settings.log_json)?;

    let handle = if settings.enable_metrics { Some(init_metrics()?) } else { None };

    info!(
        log_level = %settings.log_level,
        json_logs = settings.log_json,
        metrics_enabled = settings.enable_metrics,
        "Observability initialized"
    );
    Ok(handle)
}
