//! # Development Host Settings
//!
//! Command line flags with `CCP_SECRETS_*` environment fallbacks.

use clap::{ArgAction, Parser};
use validator::{Validate, ValidationError};

use crate::errors::Result;

fn validate_mount(mount: &str) -> std::result::Result<(), ValidationError> {
    let valid = !mount.is_empty()
        && mount.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("mount must be a single path segment of [A-Za-z0-9_-]"))
    }
}

/// Settings for the `ccp-secrets` development host.
#[derive(Debug, Clone, Parser, Validate)]
#[command(name = "ccp-secrets", version, about = "Central Credential Provider secrets backend")]
pub struct Settings {
    /// Address the HTTP server binds to
    #[arg(long, env = "CCP_SECRETS_BIND_ADDRESS", default_value = "127.0.0.1")]
    #[validate(length(min = 1))]
    pub bind_address: String,

    /// Port the HTTP server listens on
    #[arg(long, env = "CCP_SECRETS_PORT", default_value_t = 8200)]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Directory holding the backend's storage entries
    #[arg(long, env = "CCP_SECRETS_STORAGE_DIR", default_value = "./data")]
    #[validate(length(min = 1))]
    pub storage_dir: String,

    /// Log level or filter directives
    #[arg(long, env = "CCP_SECRETS_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "CCP_SECRETS_LOG_JSON")]
    pub log_json: bool,

    /// Serve Prometheus metrics at /metrics
    #[arg(long, env = "CCP_SECRETS_ENABLE_METRICS", action = ArgAction::Set, default_value_t = true)]
    pub enable_metrics: bool,

    /// Mount path the backend is served under (`/v1/<mount>/...`)
    #[arg(long, env = "CCP_SECRETS_MOUNT", default_value = "ccp")]
    #[validate(custom(function = "validate_mount"))]
    pub mount: String,
}

impl Settings {
    /// Parse from the process arguments and environment, then validate.
    pub fn load() -> Result<Self> {
        Self::parse().validated()
    }

    /// Parse from explicit arguments (first item is the binary name).
    pub fn load_from<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(args)
            .map_err(|e| crate::errors::Error::validation(e.to_string()))?
            .validated()
    }

    fn validated(self) -> Result<Self> {
        Validate::validate(&self)?;
        Ok(self)
    }

    pub fn bind_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::load_from(["ccp-secrets"]).unwrap();
        assert_eq!(settings.mount, "ccp");
        assert!(settings.enable_metrics);
        assert_eq!(settings.bind_socket(), format!("127.0.0.1:{}", settings.port));
    }

    #[test]
    fn test_flags_override() {
        let settings = Settings::load_from([
            "ccp-secrets",
            "--port",
            "9000",
            "--mount",
            "cyberark",
            "--enable-metrics",
            "false",
            "--log-json",
        ])
        .unwrap();

        assert_eq!(settings.port, 9000);
        assert_eq!(settings.mount, "cyberark");
        assert!(!settings.enable_metrics);
        assert!(settings.log_json);
    }

    #[test]
    fn test_invalid_mount_rejected() {
        assert!(Settings::load_from(["ccp-secrets", "--mount", "a/b"]).is_err());
        assert!(Settings::load_from(["ccp-secrets", "--port", "0"]).is_err());
    }
}
