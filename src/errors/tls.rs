use thiserror::Error;

/// TLS-specific error variants surfaced while turning PEM material into a client identity
/// or trust-root set.
#[derive(Debug, Error)]
pub enum TlsError {
    /// Only one half of the client certificate/key pair was supplied.
    #[error("both client_cert and client_key must be provided")]
    IncompleteIdentity,

    /// No certificates were found in the client certificate PEM.
    #[error("client_cert does not contain any certificates")]
    EmptyCertificateChain,

    /// The certificate PEM contents were invalid or unreadable.
    #[error("client_cert is not a valid PEM: {source}")]
    InvalidCertificatePem {
        #[source]
        source: anyhow::Error,
    },

    /// The private key PEM contents were invalid or unsupported.
    #[error("client_key does not contain a supported private key")]
    InvalidPrivateKey {
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The supplied certificate and key do not match.
    #[error("client_cert and client_key do not match")]
    CertificateKeyMismatch,

    /// Generic metadata extraction failure.
    #[error("failed to extract certificate metadata: {source}")]
    CertificateMetadata {
        #[source]
        source: anyhow::Error,
    },

    /// The root CA bundle did not yield a single certificate.
    #[error("unable to parse the certificate(s) in root_ca")]
    UnparsableRootBundle,

    /// The HTTP stack rejected the TLS material.
    #[error("TLS client setup failed: {0}")]
    ClientSetup(String),
}
