use tracing::{info, instrument};

use super::client_cache::InvalidationReason;
use super::record::{ClientConfig, ConfigWrite, CONFIG_KEY};
use super::request::Response;
use super::Backend;
use crate::errors::{Error, Result};
use crate::storage::{Storage, StorageEntry};

impl Backend {
    /// Return the stored configuration without the private key.
    pub(crate) async fn config_read(&self, storage: &dyn Storage) -> Result<Option<Response>> {
        let entry = storage.get(CONFIG_KEY).await?.ok_or(Error::ConfigurationMissing)?;
        let config: ClientConfig = entry.decode_json()?;
        Ok(Some(Response::new(config.to_response_data())))
    }

    /// Validate, build, persist, then swap the cached client.
    ///
    /// Nothing is persisted and the cache is untouched unless the new
    /// configuration builds into a client.
    #[instrument(skip_all)]
    pub(crate) async fn config_write(
        &self,
        storage: &dyn Storage,
        write: ConfigWrite,
    ) -> Result<Option<Response>> {
        let config = write.validate()?;
        let client = self.cache.build(&config)?;

        let entry = StorageEntry::json(CONFIG_KEY, &config)?;
        if let Err(err) = storage.put(entry).await {
            client.close().await;
            return Err(err);
        }

        self.cache.invalidate(Some(client), InvalidationReason::ConfigWrite).await;

        info!(
            host = %config.host,
            application_id = %config.application_id,
            client_identity = config.has_client_identity(),
            "credential provider configuration updated"
        );
        Ok(None)
    }
}
