//! Request and result types exchanged with the Central Credential Provider.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::{Error, Result};
use crate::secrets::SecretString;

/// Identifies the account to retrieve, either by path or by search criteria.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PasswordRequest {
    pub safe: String,
    pub folder: String,
    pub object: String,
    pub username: String,
    pub address: String,
    pub database: String,
    pub policy_id: String,
    /// Forwarded to the provider's audit log; never logged locally.
    pub reason: String,
}

/// How search criteria are matched by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum QueryFormat {
    #[default]
    Exact,
    Regex,
}

impl QueryFormat {
    /// Value of the `QueryFormat` query parameter on the wire.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Exact => "Exact",
            Self::Regex => "Regexp",
        }
    }

    /// Parse an optional selector; blank input selects [`QueryFormat::Exact`].
    pub fn parse_optional(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(Self::default()),
            Some(value) => value.parse(),
        }
    }
}

impl FromStr for QueryFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("exact") {
            Ok(Self::Exact)
        } else if s.eq_ignore_ascii_case("regex") {
            Ok(Self::Regex)
        } else {
            Err(Error::validation("invalid query_format: use exact or regex"))
        }
    }
}

impl fmt::Display for QueryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::Regex => write!(f, "regex"),
        }
    }
}

/// A retrieved account. Returned to the caller and never persisted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Account {
    pub content: SecretString,
    pub creation_method: String,
    pub safe: String,
    pub folder: String,
    #[serde(rename = "UserName")]
    pub username: String,
    pub logon_domain: String,
    pub name: String,
    pub address: String,
    pub device_type: String,
    pub database: String,
    #[serde(rename = "PolicyID")]
    pub policy_id: String,
    #[serde(deserialize_with = "flexible_bool")]
    pub password_change_in_process: bool,
}

/// Outcome of a lookup that reached the provider.
#[derive(Debug, Clone)]
pub enum Lookup {
    Found(Box<Account>),
    /// The provider's own domain error, e.g. object not found or access denied.
    Rejected(String),
}

/// Error body returned by the provider for non-success responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ProviderError {
    pub error_code: String,
    pub error_msg: String,
}

impl ProviderError {
    pub fn message(&self) -> String {
        match (self.error_code.is_empty(), self.error_msg.is_empty()) {
            (true, _) => self.error_msg.clone(),
            (false, true) => self.error_code.clone(),
            (false, false) => format!("{}: {}", self.error_code, self.error_msg),
        }
    }
}

fn flexible_bool<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Text(String),
    }

    Ok(match BoolOrString::deserialize(deserializer)? {
        BoolOrString::Bool(value) => value,
        BoolOrString::Text(text) => text.trim().eq_ignore_ascii_case("true"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_format_is_case_insensitive() {
        assert_eq!("EXACT".parse::<QueryFormat>().unwrap(), QueryFormat::Exact);
        assert_eq!("Regex".parse::<QueryFormat>().unwrap(), QueryFormat::Regex);
        assert_eq!(QueryFormat::parse_optional(None).unwrap(), QueryFormat::Exact);
        assert_eq!(QueryFormat::parse_optional(Some("")).unwrap(), QueryFormat::Exact);
    }

    #[test]
    fn test_query_format_rejects_other_values() {
        for value in ["bogus", "regexp", "exactly", " exact x"] {
            let err = value.parse::<QueryFormat>().unwrap_err();
            assert_eq!(err.to_string(), "invalid query_format: use exact or regex");
        }
    }

    #[test]
    fn test_account_from_provider_json() {
        let json = r#"{
            "Content": "s3cr3t",
            "CreationMethod": "PVWA",
            "Safe": "MySafe",
            "Folder": "Root",
            "UserName": "MyUser",
            "LogonDomain": "CORP",
            "Name": "MyObject",
            "Address": "db.example.com",
            "DeviceType": "Database",
            "Database": "orders",
            "PolicyID": "MySQL",
            "PasswordChangeInProcess": "False"
        }"#;

        let account: Account = serde_json::from_str(json).unwrap();
        assert_eq!(account.content.expose_secret(), "s3cr3t");
        assert_eq!(account.username, "MyUser");
        assert_eq!(account.policy_id, "MySQL");
        assert!(!account.password_change_in_process);
    }

    #[test]
    fn test_account_tolerates_missing_fields_and_bool_flag() {
        let account: Account =
            serde_json::from_str(r#"{"Content":"x","PasswordChangeInProcess":true}"#).unwrap();
        assert!(account.password_change_in_process);
        assert!(account.safe.is_empty());
    }

    #[test]
    fn test_provider_error_message() {
        let err: ProviderError =
            serde_json::from_str(r#"{"ErrorCode":"APPAP004E","ErrorMsg":"Password object not found"}"#)
                .unwrap();
        assert_eq!(err.message(), "APPAP004E: Password object not found");
    }
}
