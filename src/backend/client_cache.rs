//! Lazily-built, lock-guarded credential provider handle.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::record::{ClientConfig, CONFIG_KEY};
use crate::ccp::{CredentialProvider, ProviderFactory};
use crate::errors::{Error, Result};
use crate::observability::MetricsRecorder;
use crate::storage::Storage;

/// Why the cached handle was replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// A config write swapped in a freshly built handle.
    ConfigWrite,
    /// The stored record changed outside this backend.
    ExternalChange,
    Cleanup,
}

impl InvalidationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConfigWrite => "config_write",
            Self::ExternalChange => "external_change",
            Self::Cleanup => "cleanup",
        }
    }
}

/// Holds at most one live provider handle.
///
/// `acquire` and `invalidate` take the same lock, so a rebuild and a swap are
/// never observed half-done. The lock is held across the storage read and the
/// build; builds do no network I/O.
#[derive(Debug)]
pub struct ClientCache {
    factory: Arc<dyn ProviderFactory>,
    current: Mutex<Option<Arc<dyn CredentialProvider>>>,
    metrics: MetricsRecorder,
}

impl ClientCache {
    pub fn new(factory: Arc<dyn ProviderFactory>) -> Self {
        Self { factory, current: Mutex::new(None), metrics: MetricsRecorder::new() }
    }

    /// Build a handle without touching the cache.
    pub fn build(&self, config: &ClientConfig) -> Result<Arc<dyn CredentialProvider>> {
        let result = self.factory.build(config);
        self.metrics.record_client_build(result.is_ok());
        result
    }

    /// Return the live handle, building it from the stored record if needed.
    pub async fn acquire(&self, storage: &dyn Storage) -> Result<Arc<dyn CredentialProvider>> {
        let mut current = self.current.lock().await;
        if let Some(client) = current.as_ref() {
            return Ok(Arc::clone(client));
        }

        let entry = storage.get(CONFIG_KEY).await?.ok_or(Error::ConfigurationMissing)?;
        let config: ClientConfig = entry.decode_json()?;
        let client = self.build(&config)?;

        debug!(host = %config.host, "built credential provider client");
        *current = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Close the live handle, if any, and install `replacement`.
    pub async fn invalidate(
        &self,
        replacement: Option<Arc<dyn CredentialProvider>>,
        reason: InvalidationReason,
    ) {
        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            previous.close().await;
        } else if replacement.is_none() {
            return;
        }

        match reason {
            InvalidationReason::ExternalChange => {
                warn!(reason = reason.as_str(), "configuration changed externally, dropping client")
            }
            _ => info!(reason = reason.as_str(), "credential provider client replaced"),
        }
        self.metrics.record_client_invalidation(reason.as_str());
        *current = replacement;
    }

    /// Whether a live handle is cached.
    pub async fn is_populated(&self) -> bool {
        self.current.lock().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ccp::{Lookup, PasswordRequest, QueryFormat};
    use crate::storage::{InMemoryStorage, StorageEntry};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct StubProvider {
        closed: AtomicBool,
    }

    #[async_trait]
    impl CredentialProvider for StubProvider {
        async fn fetch(&self, _request: &PasswordRequest) -> Result<Lookup> {
            Ok(Lookup::Rejected("stub".into()))
        }

        async fn search(&self, _request: &PasswordRequest, _format: QueryFormat) -> Result<Lookup> {
            Ok(Lookup::Rejected("stub".into()))
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[derive(Debug, Default)]
    struct CountingFactory {
        builds: AtomicUsize,
    }

    impl ProviderFactory for CountingFactory {
        fn build(&self, _config: &ClientConfig) -> Result<Arc<dyn CredentialProvider>> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(StubProvider::default()))
        }
    }

    async fn storage_with_config() -> InMemoryStorage {
        let storage = InMemoryStorage::new();
        let config = serde_json::json!({ "host": "ccp.example.com", "application_id": "MyApp" });
        storage.put(StorageEntry::json(CONFIG_KEY, &config).unwrap()).await.unwrap();
        storage
    }

    #[tokio::test]
    async fn test_acquire_without_config() {
        let cache = ClientCache::new(Arc::new(CountingFactory::default()));
        let err = cache.acquire(&InMemoryStorage::new()).await.unwrap_err();

        assert!(matches!(err, Error::ConfigurationMissing));
        assert!(!cache.is_populated().await);
    }

    #[tokio::test]
    async fn test_acquire_builds_once() {
        let factory = Arc::new(CountingFactory::default());
        let cache = ClientCache::new(factory.clone());
        let storage = storage_with_config().await;

        let first = cache.acquire(&storage).await.unwrap();
        let second = cache.acquire(&storage).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.builds.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidate_closes_previous_and_installs_replacement() {
        let cache = ClientCache::new(Arc::new(CountingFactory::default()));
        let first = Arc::new(StubProvider::default());
        let second: Arc<dyn CredentialProvider> = Arc::new(StubProvider::default());

        let previous: Arc<dyn CredentialProvider> = first.clone();
        cache.invalidate(Some(previous), InvalidationReason::ConfigWrite).await;
        cache.invalidate(Some(second.clone()), InvalidationReason::ConfigWrite).await;

        assert!(first.closed.load(Ordering::SeqCst));
        let current = cache.acquire(&InMemoryStorage::new()).await.unwrap();
        assert!(Arc::ptr_eq(&current, &second));
    }

    #[tokio::test]
    async fn test_invalidate_to_none_forces_rebuild() {
        let factory = Arc::new(CountingFactory::default());
        let cache = ClientCache::new(factory.clone());
        let storage = storage_with_config().await;

        cache.acquire(&storage).await.unwrap();
        cache.invalidate(None, InvalidationReason::Cleanup).await;
        assert!(!cache.is_populated().await);

        cache.acquire(&storage).await.unwrap();
        assert_eq!(factory.builds.load(Ordering::SeqCst), 2);
    }
}
