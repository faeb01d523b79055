//! HTTP client for the Central Credential Provider web service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use url::Url;

use super::provider::CredentialProvider;
use super::types::{Account, Lookup, PasswordRequest, ProviderError, QueryFormat};
use crate::errors::{Error, Result};
use crate::utils::non_blank;

const ACCOUNTS_PATH: &str = "AIMWebService/api/Accounts";

/// Connection timeout used when the configuration leaves it at zero.
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Added on top of the provider-side timeout so the provider can answer first.
pub const REQUEST_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Connection parameters that shape every outbound request.
#[derive(Debug, Clone)]
pub struct CcpClientConfig {
    pub host: String,
    pub application_id: String,
    /// Seconds the provider may spend retrieving the password; 0 leaves the
    /// provider default in place.
    pub connection_timeout: u64,
    pub fail_request_on_password_change: bool,
}

impl CcpClientConfig {
    /// Effective transport timeout for the HTTP connection.
    pub fn connect_timeout(&self) -> Duration {
        match self.connection_timeout {
            0 => Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS),
            secs => Duration::from_secs(secs),
        }
    }

    /// Upper bound on a whole request, including the provider's own retrieval.
    pub fn request_timeout(&self) -> Duration {
        self.connect_timeout() + REQUEST_GRACE_PERIOD
    }
}

/// Resolve the accounts endpoint from a `host[:port]` or a full base URL.
pub fn accounts_endpoint(host: &str) -> Result<Url> {
    let host = host.trim().trim_end_matches('/');
    let base = if host.starts_with("https://") {
        host.to_string()
    } else if host.starts_with("http://") {
        warn!(host = %host, "credential provider configured over plain http");
        host.to_string()
    } else {
        format!("https://{host}")
    };

    Url::parse(&format!("{base}/{ACCOUNTS_PATH}"))
        .map_err(|e| Error::build(format!("invalid host {host}: {e}")))
}

/// Credential provider reached over HTTPS with optional mutual TLS.
#[derive(Debug)]
pub struct CcpClient {
    endpoint: Url,
    config: CcpClientConfig,
    http: RwLock<Option<reqwest::Client>>,
}

impl CcpClient {
    /// Wrap a configured HTTP client. No network I/O happens here.
    pub fn new(config: CcpClientConfig, http: reqwest::Client) -> Result<Self> {
        let endpoint = accounts_endpoint(&config.host)?;
        Ok(Self { endpoint, config, http: RwLock::new(Some(http)) })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn config(&self) -> &CcpClientConfig {
        &self.config
    }

    fn common_params(&self, request: &PasswordRequest) -> Vec<(&'static str, String)> {
        let mut params = vec![("AppID", self.config.application_id.clone())];
        push_param(&mut params, "Reason", &request.reason);
        if self.config.connection_timeout > 0 {
            params.push(("ConnectionTimeout", self.config.connection_timeout.to_string()));
        }
        if self.config.fail_request_on_password_change {
            params.push(("FailRequestOnPasswordChange", "true".to_string()));
        }
        params
    }

    async fn lookup(&self, params: Vec<(&'static str, String)>) -> Result<Lookup> {
        let http = self
            .http
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::transport("client has been closed"))?;

        let response = http
            .get(self.endpoint.clone())
            .query(&params)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::transport(e.without_url().to_string()))?;

        let status = response.status();
        let body =
            response.bytes().await.map_err(|e| Error::transport(e.without_url().to_string()))?;

        if status.is_success() {
            let account: Account = serde_json::from_slice(&body).map_err(|e| {
                Error::transport(format!("unexpected response from credential provider: {e}"))
            })?;
            return Ok(Lookup::Found(Box::new(account)));
        }

        match serde_json::from_slice::<ProviderError>(&body) {
            Ok(rejection) => {
                debug!(status = %status, code = %rejection.error_code, "credential provider rejected request");
                Ok(Lookup::Rejected(rejection.message()))
            }
            Err(_) => Err(Error::transport(format!("credential provider returned HTTP {status}"))),
        }
    }
}

fn push_param(params: &mut Vec<(&'static str, String)>, name: &'static str, value: &str) {
    if let Some(value) = non_blank(value) {
        params.push((name, value.to_string()));
    }
}

/// Build the `Query` search expression, e.g. `Safe=MySafe;UserName=admin`.
pub fn search_expression(request: &PasswordRequest) -> Result<String> {
    let criteria = [
        ("Safe", &request.safe),
        ("Folder", &request.folder),
        ("Object", &request.object),
        ("UserName", &request.username),
        ("Address", &request.address),
        ("Database", &request.database),
        ("PolicyID", &request.policy_id),
    ];

    let mut parts = Vec::new();
    for (name, value) in criteria {
        let Some(value) = non_blank(value) else { continue };
        if value.contains(';') {
            return Err(Error::validation(format!(
                "invalid search criteria: {name} must not contain ';'"
            )));
        }
        parts.push(format!("{name}={value}"));
    }
    Ok(parts.join(";"))
}

#[async_trait]
impl CredentialProvider for CcpClient {
    #[instrument(skip(self, request), fields(safe = %request.safe, folder = %request.folder, object = %request.object))]
    async fn fetch(&self, request: &PasswordRequest) -> Result<Lookup> {
        let mut params = self.common_params(request);
        push_param(&mut params, "Safe", &request.safe);
        push_param(&mut params, "Folder", &request.folder);
        push_param(&mut params, "Object", &request.object);
        self.lookup(params).await
    }

    #[instrument(skip(self, request), fields(format = %format))]
    async fn search(&self, request: &PasswordRequest, format: QueryFormat) -> Result<Lookup> {
        let query = search_expression(request)?;
        let mut params = self.common_params(request);
        params.push(("Query", query));
        params.push(("QueryFormat", format.as_wire().to_string()));
        self.lookup(params).await
    }

    async fn close(&self) {
        if self.http.write().await.take().is_some() {
            debug!(endpoint = %self.endpoint, "closed credential provider client");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str) -> CcpClientConfig {
        CcpClientConfig {
            host: host.to_string(),
            application_id: "MyApp".to_string(),
            connection_timeout: 0,
            fail_request_on_password_change: false,
        }
    }

    #[test]
    fn test_endpoint_from_host_and_port() {
        let url = accounts_endpoint("vault.example.com:443").unwrap();
        assert_eq!(url.as_str(), "https://vault.example.com/AIMWebService/api/Accounts");

        let url = accounts_endpoint("ccp.example.com:8443").unwrap();
        assert_eq!(url.as_str(), "https://ccp.example.com:8443/AIMWebService/api/Accounts");
    }

    #[test]
    fn test_endpoint_keeps_explicit_scheme() {
        let url = accounts_endpoint("http://127.0.0.1:9000/").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/AIMWebService/api/Accounts");
    }

    #[test]
    fn test_endpoint_rejects_garbage_host() {
        assert!(matches!(accounts_endpoint("exa mple.com"), Err(Error::Build(_))));
    }

    #[test]
    fn test_timeouts_default_when_zero() {
        let cfg = config("ccp.example.com");
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(40));
    }

    #[test]
    fn test_search_expression_skips_blank_criteria() {
        let request = PasswordRequest {
            safe: "MySafe".into(),
            username: "MyUser".into(),
            address: " ".into(),
            ..Default::default()
        };
        assert_eq!(search_expression(&request).unwrap(), "Safe=MySafe;UserName=MyUser");
    }

    #[test]
    fn test_search_expression_rejects_separator() {
        let request = PasswordRequest { safe: "a;Object=b".into(), ..Default::default() };
        assert!(matches!(search_expression(&request), Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_closed_client_fails_with_transport_error() {
        let client = CcpClient::new(config("ccp.example.com"), reqwest::Client::new()).unwrap();
        client.close().await;

        let err = client.fetch(&PasswordRequest::default()).await.unwrap_err();
        assert_eq!(err.to_string(), "Transport error: client has been closed");
    }
}
