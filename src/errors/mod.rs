//! # Error Handling
//!
//! Error taxonomy for the credential provider backend. Errors fall into two
//! groups: caller-visible errors, which the request dispatcher turns into an
//! error response, and hard errors, which are handed back to the host.

pub mod tls;

pub use tls::TlsError;

/// Custom result type for backend operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the backend
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Caller input is malformed or missing
    #[error("{0}")]
    Validation(String),

    /// No configuration record has been written yet
    #[error("configure the CCP client with config first")]
    ConfigurationMissing,

    /// The configuration could not be turned into a client
    #[error("unable to create the CCP client: {0}")]
    Build(String),

    /// Domain error reported by the credential provider itself
    #[error("{0}")]
    RemoteLogical(String),

    /// Network failure talking to the credential provider
    #[error("Transport error: {0}")]
    Transport(String),

    /// Host storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The inbound request was cancelled before the outbound call finished
    #[error("request cancelled")]
    Cancelled,

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new client build error
    pub fn build<S: Into<String>>(message: S) -> Self {
        Self::Build(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new storage error
    pub fn storage<S: Into<String>>(message: S) -> Self {
        Self::Storage(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Whether this error is reported to the caller as an error response
    /// rather than propagated to the host as a failure.
    pub fn is_caller_visible(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::ConfigurationMissing | Self::Build(_) | Self::RemoteLogical(_)
        )
    }
}

impl From<TlsError> for Error {
    fn from(err: TlsError) -> Self {
        Self::Build(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}
