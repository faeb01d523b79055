//! Redaction helpers for secret material handled by the backend.
//!
//! The backend never persists or logs retrieved credentials. Private key
//! material in the configuration record is the only secret written to host
//! storage, and only through the [`exposed`] serde adapter.

pub mod types;

pub use types::{exposed, SecretString};
