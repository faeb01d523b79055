//! # Central Credential Provider client
//!
//! Request/result types, the [`CredentialProvider`] seam used by the backend,
//! the HTTP implementation and the factory that builds it from configuration.

pub mod client;
pub mod factory;
pub mod provider;
pub mod types;

pub use client::{CcpClient, CcpClientConfig};
pub use factory::{CcpClientFactory, ProviderFactory};
pub use provider::CredentialProvider;
pub use types::{Account, Lookup, PasswordRequest, QueryFormat};
