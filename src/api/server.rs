use tokio::net::TcpListener;
use tracing::{info, warn};

use super::routes::{build_router, ApiState};
use crate::errors::{Error, Result};

/// Serve the development host until Ctrl-C, then release the backend client.
pub async fn start_api_server(bind: &str, state: ApiState) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| Error::internal(format!("Failed to bind API server to {bind}: {e}")))?;

    info!(address = %bind, mount = %state.mount, "Starting HTTP API server");

    let backend = state.backend.clone();
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "API server shutdown listener failed");
            }
        })
        .await
        .map_err(|e| Error::internal(format!("API server error: {e}")))?;

    backend.cleanup().await;
    info!("API server shutdown completed");
    Ok(())
}
