//! # Structured Logging
//!
//! Tracing subscriber setup. `RUST_LOG` takes precedence over the configured
//! level when set.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::errors::{Error, Result};

/// Create a tracing span for a backend request arriving over HTTP.
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4()
        )
    };
}

fn env_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| Error::validation(format!("invalid log level '{level}': {e}"))),
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = env_filter(level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry.with(fmt::layer().json().with_current_span(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|e| Error::internal(format!("Failed to initialize logging: {}", e)))
}
