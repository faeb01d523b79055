//! Utility functions and helpers

pub mod certificates;

pub use certificates::{parse_client_identity, parse_root_bundle, CertificateInfo, ClientIdentity};

/// Returns `None` for empty or whitespace-only strings.
pub fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(value)
}
