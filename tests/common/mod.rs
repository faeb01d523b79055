//! Shared fixtures for integration tests: an in-process credential provider,
//! a factory that hands it out, and certificate generation.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ccp_secrets::backend::{Backend, ClientConfig, Operation, Request, Response};
use ccp_secrets::ccp::{
    Account, CredentialProvider, Lookup, PasswordRequest, ProviderFactory, QueryFormat,
};
use ccp_secrets::errors::{Error, Result};
use ccp_secrets::secrets::SecretString;
use ccp_secrets::storage::{InMemoryStorage, Storage};
use rcgen::{CertificateParams, DnType, KeyPair};

/// Safe name that makes [`FakeProvider`] report a provider-side rejection.
pub const MISSING_SAFE: &str = "Missing";
/// Safe name that makes [`FakeProvider`] fail at the transport level.
pub const UNREACHABLE_SAFE: &str = "Down";
/// Object name that makes [`FakeProvider`] never answer.
pub const HANGING_OBJECT: &str = "Slow";

/// Credential provider answering from the configuration it was built with.
#[derive(Debug)]
pub struct FakeProvider {
    pub application_id: String,
    pub host: String,
    pub closed: AtomicBool,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<PasswordRequest>>,
    pub last_format: Mutex<Option<QueryFormat>>,
}

impl FakeProvider {
    fn new(config: &ClientConfig) -> Self {
        Self {
            application_id: config.application_id.clone(),
            host: config.host.clone(),
            closed: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            last_format: Mutex::new(None),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn answer(&self, request: &PasswordRequest) -> Result<Lookup> {
        if self.is_closed() {
            return Err(Error::transport("client has been closed"));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        if request.object == HANGING_OBJECT {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        match request.safe.as_str() {
            MISSING_SAFE => {
                return Ok(Lookup::Rejected(
                    "APPAP004E: Password object matching query was not found".to_string(),
                ))
            }
            UNREACHABLE_SAFE => return Err(Error::transport("connection refused")),
            _ => {}
        }

        Ok(Lookup::Found(Box::new(Account {
            content: SecretString::new(format!("secret-for-{}", self.application_id)),
            creation_method: "PVWA".to_string(),
            safe: request.safe.clone(),
            folder: if request.folder.is_empty() { "Root".into() } else { request.folder.clone() },
            username: if request.username.is_empty() { "svc".into() } else { request.username.clone() },
            name: request.object.clone(),
            address: "db.example.com".to_string(),
            device_type: "Database".to_string(),
            policy_id: "MySQL".to_string(),
            ..Default::default()
        })))
    }
}

#[async_trait]
impl CredentialProvider for FakeProvider {
    async fn fetch(&self, request: &PasswordRequest) -> Result<Lookup> {
        self.answer(request).await
    }

    async fn search(&self, request: &PasswordRequest, format: QueryFormat) -> Result<Lookup> {
        *self.last_format.lock().unwrap() = Some(format);
        self.answer(request).await
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Factory producing [`FakeProvider`]s and remembering each one.
#[derive(Debug, Default)]
pub struct FakeFactory {
    pub builds: AtomicUsize,
    pub built: Mutex<Vec<Arc<FakeProvider>>>,
}

impl FakeFactory {
    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn provider(&self, index: usize) -> Arc<FakeProvider> {
        self.built.lock().unwrap()[index].clone()
    }
}

impl ProviderFactory for FakeFactory {
    fn build(&self, config: &ClientConfig) -> Result<Arc<dyn CredentialProvider>> {
        if config.host == "unbuildable.example.com" {
            return Err(Error::build("host is not reachable by policy"));
        }
        self.builds.fetch_add(1, Ordering::SeqCst);
        let provider = Arc::new(FakeProvider::new(config));
        self.built.lock().unwrap().push(provider.clone());
        Ok(provider)
    }
}

/// A backend wired to a [`FakeFactory`] plus empty in-memory storage.
pub struct Harness {
    pub backend: Arc<Backend>,
    pub factory: Arc<FakeFactory>,
    pub storage: Arc<InMemoryStorage>,
}

impl Harness {
    pub fn new() -> Self {
        let factory = Arc::new(FakeFactory::default());
        Self {
            backend: Arc::new(Backend::with_factory(factory.clone())),
            factory,
            storage: Arc::new(InMemoryStorage::new()),
        }
    }

    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    pub fn request(&self, operation: Operation, path: &str) -> Request {
        Request::new(operation, path, self.storage())
    }

    pub async fn send(&self, request: Request) -> Option<Response> {
        self.backend.handle_request(request).await.expect("request should not hard-fail")
    }

    pub async fn write_config(&self, application_id: &str) -> Option<Response> {
        let request = self
            .request(Operation::Update, "config")
            .with_field("host", "vault.example.com:443")
            .with_field("application_id", application_id);
        self.send(request).await
    }

    pub async fn read(&self, path: &str) -> Response {
        self.send(self.request(Operation::Read, path)).await.expect("read returns a response")
    }
}

/// A self-signed certificate and its PKCS#8 key, both PEM encoded.
pub fn client_identity(common_name: &str) -> (String, String) {
    let key = KeyPair::generate().expect("generate key");
    let mut params =
        CertificateParams::new(vec![format!("{common_name}.example.com")]).expect("params");
    params.distinguished_name.push(DnType::CommonName, common_name);
    let cert = params.self_signed(&key).expect("self-sign");
    (cert.pem(), key.serialize_pem())
}
