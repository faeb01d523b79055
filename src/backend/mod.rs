//! # Credential Provider Backend
//!
//! Routes host requests to the config, object and query handlers and owns the
//! cached provider client.
//!
//! ## Error reporting
//!
//! Handlers return `Result<Option<Response>>`. Caller-visible errors
//! (validation, missing configuration, client build failures and the
//! provider's own rejections) are turned into an error [`Response`] by
//! [`Backend::handle_request`]; everything else is returned to the host as
//! `Err`.

pub mod client_cache;
pub mod path_config;
pub mod path_object;
pub mod path_query;
pub mod paths;
pub mod record;
pub mod request;

pub use client_cache::{ClientCache, InvalidationReason};
pub use paths::{PathKind, RouteMatch, PATHS};
pub use record::{ClientConfig, ConfigWrite, CONFIG_KEY};
pub use request::{Operation, Request, Response};

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::ccp::{Account, CcpClientFactory, Lookup, ProviderFactory};
use crate::errors::{Error, Result};
use crate::observability::MetricsRecorder;
use crate::storage::Storage;

/// One mounted instance of the backend.
#[derive(Debug)]
pub struct Backend {
    cache: ClientCache,
    metrics: MetricsRecorder,
}

impl Default for Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend {
    /// Backend talking to a real Central Credential Provider.
    pub fn new() -> Self {
        Self::with_factory(Arc::new(CcpClientFactory::new()))
    }

    pub fn with_factory(factory: Arc<dyn ProviderFactory>) -> Self {
        Self { cache: ClientCache::new(factory), metrics: MetricsRecorder::new() }
    }

    pub fn cache(&self) -> &ClientCache {
        &self.cache
    }

    /// Pre-build the client from stored configuration. Never fatal.
    pub async fn initialize(&self, storage: &dyn Storage) {
        match self.cache.acquire(storage).await {
            Ok(_) => info!("credential provider client initialized"),
            Err(Error::ConfigurationMissing) => info!("backend is not configured yet"),
            Err(err) => warn!(error = %err, "unable to initialize credential provider client"),
        }
    }

    /// Called by the host when a stored key changed outside this backend.
    pub async fn invalidate_key(&self, key: &str) {
        if key == CONFIG_KEY {
            self.cache.invalidate(None, InvalidationReason::ExternalChange).await;
        }
    }

    /// Release the client on shutdown.
    pub async fn cleanup(&self) {
        self.cache.invalidate(None, InvalidationReason::Cleanup).await;
    }

    /// Whether a record exists at the request path.
    ///
    /// Used by the host to choose between create and update.
    pub async fn existence_check(&self, request: &Request) -> Result<bool> {
        match paths::route(&request.path) {
            Some(matched) if matched.spec.existence_check => {
                Ok(request.storage.get(&request.path).await?.is_some())
            }
            Some(_) => Ok(false),
            None => Err(Error::validation("unsupported path")),
        }
    }

    /// Dispatch a request to its handler.
    ///
    /// `Ok(None)` means the operation succeeded with no content.
    #[instrument(skip(self, request), fields(operation = %request.operation, path = %request.path))]
    pub async fn handle_request(&self, request: Request) -> Result<Option<Response>> {
        let matched = paths::route(&request.path);
        let label = matched.as_ref().map_or("unknown", |m| m.spec.kind.as_str());

        let (outcome, result) = match self.dispatch(matched, request).await {
            Ok(response) => ("success", Ok(response)),
            Err(err) if err.is_caller_visible() => {
                debug!(error = %err, "request rejected");
                ("rejected", Ok(Some(Response::error(err.to_string()))))
            }
            Err(Error::Cancelled) => {
                debug!("request cancelled by caller");
                ("cancelled", Err(Error::Cancelled))
            }
            Err(err) => {
                error!(error = %err, "request failed");
                ("failed", Err(err))
            }
        };

        self.metrics.record_request(label, outcome);
        result
    }

    async fn dispatch(
        &self,
        matched: Option<RouteMatch>,
        request: Request,
    ) -> Result<Option<Response>> {
        let Request { operation, path, data, storage, cancel } = request;

        let Some(matched) = matched else {
            if operation == Operation::Help && path.is_empty() {
                return Ok(Some(paths::backend_help()));
            }
            return Err(Error::validation("unsupported path"));
        };

        let spec = matched.spec;
        if !spec.supports(operation) {
            return Err(Error::validation("unsupported operation"));
        }
        if operation == Operation::Help {
            return Ok(Some(spec.help()));
        }

        let mut data = data;
        spec.coerce_fields(&mut data);
        data.extend(matched.captures);

        let storage = storage.as_ref();
        match (spec.kind, operation) {
            (PathKind::Config, Operation::Read) => self.config_read(storage).await,
            (PathKind::Config, Operation::Create | Operation::Update) => {
                self.config_write(storage, decode(data)?).await
            }
            (PathKind::Object, Operation::Read) => {
                self.object_read(storage, decode(data)?, &cancel).await
            }
            (PathKind::Query, Operation::Read) => {
                self.query_read(storage, decode(data)?, &cancel).await
            }
            _ => Err(Error::validation("unsupported operation")),
        }
    }
}

/// Decode request fields into a handler's strict parameter struct.
fn decode<T: DeserializeOwned>(data: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(data))
        .map_err(|e| Error::validation(format!("invalid request data: {e}")))
}

/// Run an outbound call, abandoning it if the caller cancels.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    call: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = call => result,
    }
}

/// Flatten an account into the snake_case response shape.
fn account_response(account: &Account) -> Response {
    let value = json!({
        "content": account.content.expose_secret(),
        "creation_method": account.creation_method,
        "safe": account.safe,
        "folder": account.folder,
        "username": account.username,
        "logon_domain": account.logon_domain,
        "name": account.name,
        "address": account.address,
        "device_type": account.device_type,
        "database": account.database,
        "policy_id": account.policy_id,
        "password_change_in_process": account.password_change_in_process,
    });
    match value {
        Value::Object(data) => Response::new(data),
        _ => Response::default(),
    }
}

fn lookup_response(lookup: Lookup) -> Result<Option<Response>> {
    match lookup {
        Lookup::Found(account) => Ok(Some(account_response(&account))),
        Lookup::Rejected(message) => Err(Error::RemoteLogical(message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretString;
    use crate::storage::InMemoryStorage;

    fn backend() -> Backend {
        Backend::new()
    }

    fn request(operation: Operation, path: &str) -> Request {
        Request::new(operation, path, Arc::new(InMemoryStorage::new()))
    }

    #[test]
    fn test_account_response_shape() {
        let account = Account {
            content: SecretString::new("s3cr3t"),
            username: "MyUser".into(),
            password_change_in_process: true,
            ..Default::default()
        };
        let response = account_response(&account);

        assert_eq!(response.data.len(), 12);
        assert_eq!(response.data["content"], "s3cr3t");
        assert_eq!(response.data["username"], "MyUser");
        assert_eq!(response.data["password_change_in_process"], true);
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let response = backend().handle_request(request(Operation::Read, "nope")).await.unwrap();
        assert_eq!(response.unwrap().error_message(), Some("unsupported path"));
    }

    #[tokio::test]
    async fn test_unsupported_operation() {
        let response =
            backend().handle_request(request(Operation::Update, "query")).await.unwrap();
        assert_eq!(response.unwrap().error_message(), Some("unsupported operation"));
    }

    #[tokio::test]
    async fn test_help_on_mount_and_path() {
        let response = backend().handle_request(request(Operation::Help, "")).await.unwrap();
        assert!(response.unwrap().data.contains_key("paths"));

        let response = backend().handle_request(request(Operation::Help, "config")).await.unwrap();
        assert!(response.unwrap().data.contains_key("fields"));
    }

    #[tokio::test]
    async fn test_unknown_field_is_rejected() {
        let req = request(Operation::Update, "config")
            .with_field("host", "ccp.example.com")
            .with_field("application_id", "MyApp")
            .with_field("client_cert_key", "x");
        let response = backend().handle_request(req).await.unwrap().unwrap();

        assert!(response.error_message().unwrap().starts_with("invalid request data:"));
    }

    #[tokio::test]
    async fn test_existence_check() {
        let backend = backend();
        assert!(!backend.existence_check(&request(Operation::Update, "config")).await.unwrap());
        assert!(backend.existence_check(&request(Operation::Read, "missing")).await.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<()> = until_cancelled(&cancel, std::future::pending()).await;
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
