//! Credential provider trait
//!
//! Defines the interface the backend uses to talk to the remote provider.

use async_trait::async_trait;

use super::types::{Lookup, PasswordRequest, QueryFormat};
use crate::errors::Result;

/// A live, authenticated handle to the credential provider.
///
/// Implementations must be Send + Sync; a single handle is shared by every
/// in-flight request until it is invalidated.
#[async_trait]
pub trait CredentialProvider: Send + Sync + std::fmt::Debug {
    /// Retrieve one account addressed by safe, folder and object.
    ///
    /// # Returns
    /// `Lookup::Rejected` for the provider's own domain errors; `Err` only for
    /// transport-level failures.
    async fn fetch(&self, request: &PasswordRequest) -> Result<Lookup>;

    /// Retrieve one account matching the search criteria in `request`.
    async fn search(&self, request: &PasswordRequest, format: QueryFormat) -> Result<Lookup>;

    /// Release connections held by this handle. Later calls fail.
    async fn close(&self);
}
