use std::sync::Arc;

use ccp_secrets::{
    api::{start_api_server, ApiState},
    backend::Backend,
    config::Settings,
    observability::init_observability,
    storage::{FileStorage, Storage},
    APP_NAME, VERSION,
};
use tracing::info;

fn install_rustls_provider() -> anyhow::Result<()> {
    use rustls::crypto::{ring, CryptoProvider};

    if CryptoProvider::get_default().is_none() {
        ring::default_provider()
            .install_default()
            .map_err(|_| anyhow::anyhow!("failed to install ring crypto provider"))?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    install_rustls_provider()?;

    // Load .env file if it exists (optional - won't fail if missing)
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("Warning: Error loading .env file: {}", e);
        }
    }

    let settings = Settings::load()?;
    let metrics = init_observability(&settings)?;

    info!(app_name = APP_NAME, version = VERSION, "Starting CCP secrets backend");

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(&settings.storage_dir).await?);
    info!(storage_dir = %settings.storage_dir, "Opened file storage");

    let backend = Arc::new(Backend::new());
    backend.initialize(storage.as_ref()).await;

    let mut state = ApiState::new(backend, storage, settings.mount.clone());
    if let Some(handle) = metrics {
        state = state.with_metrics(handle);
    }

    start_api_server(&settings.bind_socket(), state).await?;
    Ok(())
}
