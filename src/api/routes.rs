use std::sync::Arc;

use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_handler, metrics_handler, mount_help_handler, read_handler, write_handler,
};
use crate::backend::Backend;
use crate::storage::Storage;

#[derive(Clone)]
pub struct ApiState {
    pub backend: Arc<Backend>,
    pub storage: Arc<dyn Storage>,
    pub mount: String,
    pub metrics: Option<PrometheusHandle>,
}

impl ApiState {
    pub fn new(backend: Arc<Backend>, storage: Arc<dyn Storage>, mount: impl Into<String>) -> Self {
        Self { backend, storage, mount: mount.into(), metrics: None }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/v1/{mount}", get(mount_help_handler))
        .route(
            "/v1/{mount}/{*path}",
            get(read_handler).post(write_handler).put(write_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
