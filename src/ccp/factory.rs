//! Turns a stored [`ClientConfig`] into a live credential provider handle.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::client::{CcpClient, CcpClientConfig};
use super::provider::CredentialProvider;
use crate::backend::record::ClientConfig;
use crate::errors::{Error, Result, TlsError};
use crate::utils::{non_blank, parse_client_identity, parse_root_bundle};

/// Builds provider handles from configuration.
///
/// Building must not perform network I/O; connections are opened lazily by
/// the first request.
pub trait ProviderFactory: Send + Sync + std::fmt::Debug {
    fn build(&self, config: &ClientConfig) -> Result<Arc<dyn CredentialProvider>>;
}

/// Factory for [`CcpClient`] over reqwest with rustls.
#[derive(Debug, Clone, Copy, Default)]
pub struct CcpClientFactory;

impl CcpClientFactory {
    pub fn new() -> Self {
        Self
    }

    /// Build the concrete client; [`ProviderFactory::build`] erases the type.
    pub fn build_client(&self, config: &ClientConfig) -> Result<CcpClient> {
        let client_config = CcpClientConfig {
            host: config.host.clone(),
            application_id: config.application_id.clone(),
            connection_timeout: config.connection_timeout,
            fail_request_on_password_change: config.fail_request_on_password_change,
        };

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .connect_timeout(client_config.connect_timeout())
            .timeout(client_config.request_timeout());

        match (non_blank(&config.client_cert), non_blank(config.client_key.expose_secret())) {
            (Some(cert), Some(key)) => {
                let identity = parse_client_identity(cert, key)?;
                if identity.info.is_expired_at(Utc::now()) {
                    warn!(
                        subject = %identity.info.subject,
                        not_after = %identity.info.not_after,
                        "client certificate has expired"
                    );
                }
                info!(
                    subject = %identity.info.subject,
                    issuer = %identity.info.issuer,
                    not_after = %identity.info.not_after,
                    chain_len = identity.chain.len(),
                    "loaded client certificate"
                );
                let identity = reqwest::Identity::from_pem(&identity.combined_pem)
                    .map_err(|e| TlsError::ClientSetup(e.to_string()))?;
                builder = builder.identity(identity);
            }
            (None, None) => {}
            _ => return Err(TlsError::IncompleteIdentity.into()),
        }

        if let Some(bundle) = non_blank(&config.root_ca) {
            let roots = parse_root_bundle(bundle)?;
            debug!(count = roots.len(), "using configured root CA bundle");
            builder = builder.tls_built_in_root_certs(false);
            for root in roots {
                let certificate = reqwest::Certificate::from_der(root.as_ref())
                    .map_err(|e| TlsError::ClientSetup(e.to_string()))?;
                builder = builder.add_root_certificate(certificate);
            }
        }

        if config.skip_tls_verify {
            warn!(host = %config.host, "server certificate verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if config.enable_tls_renegotiation {
            debug!("TLS renegotiation requested but not supported by rustls; ignoring");
        }

        let http = builder.build().map_err(|e| Error::build(e.without_url().to_string()))?;
        CcpClient::new(client_config, http)
    }
}

impl ProviderFactory for CcpClientFactory {
    fn build(&self, config: &ClientConfig) -> Result<Arc<dyn CredentialProvider>> {
        Ok(Arc::new(self.build_client(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::secrets::SecretString;
    use rcgen::{CertificateParams, KeyPair};

    fn base_config() -> ClientConfig {
        ClientConfig {
            host: "vault.example.com:443".to_string(),
            application_id: "MyApp".to_string(),
            connection_timeout: 30,
            fail_request_on_password_change: false,
            client_cert: String::new(),
            client_key: SecretString::default(),
            skip_tls_verify: false,
            enable_tls_renegotiation: false,
            root_ca: String::new(),
        }
    }

    fn identity() -> (String, String) {
        let key = KeyPair::generate().unwrap();
        let params = CertificateParams::new(vec!["client.example.com".to_string()]).unwrap();
        (params.self_signed(&key).unwrap().pem(), key.serialize_pem())
    }

    #[test]
    fn test_builds_without_tls_material() {
        let client = CcpClientFactory::new().build_client(&base_config()).unwrap();
        assert_eq!(client.endpoint().host_str(), Some("vault.example.com"));
    }

    #[test]
    fn test_builds_with_identity_and_roots() {
        let (cert, key) = identity();
        let (ca, _) = identity();
        let mut config = base_config();
        config.client_cert = cert;
        config.client_key = SecretString::new(key);
        config.root_ca = ca;
        config.enable_tls_renegotiation = true;

        assert!(CcpClientFactory::new().build(&config).is_ok());
    }

    #[test]
    fn test_half_identity_is_build_error() {
        let (cert, _) = identity();
        let mut config = base_config();
        config.client_cert = cert;

        let err = CcpClientFactory::new().build(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to create the CCP client: both client_cert and client_key must be provided"
        );
    }

    #[test]
    fn test_mismatched_identity_is_build_error() {
        let (cert, _) = identity();
        let (_, other_key) = identity();
        let mut config = base_config();
        config.client_cert = cert;
        config.client_key = SecretString::new(other_key);

        let err = CcpClientFactory::new().build(&config).unwrap_err();
        assert!(matches!(err, Error::Build(_)));
    }

    #[test]
    fn test_bad_root_bundle_is_build_error() {
        let mut config = base_config();
        config.root_ca = "not a certificate".to_string();

        let err = CcpClientFactory::new().build(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to create the CCP client: unable to parse the certificate(s) in root_ca"
        );
    }
}
