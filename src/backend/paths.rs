//! Path patterns, field schemas and help text for the backend's endpoints.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::request::{Operation, Response};

/// Field types accepted from the routing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldSchema {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub description: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldSchema {
    fn string(name: &'static str, description: &'static str) -> Self {
        Self { name, field_type: FieldType::String, description, required: false, default: None }
    }

    fn required(mut self) -> Self {
        self.required = true;
        self
    }

    fn int(name: &'static str, description: &'static str, default: i64) -> Self {
        Self {
            name,
            field_type: FieldType::Int,
            description,
            required: false,
            default: Some(json!(default)),
        }
    }

    fn bool(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            field_type: FieldType::Bool,
            description,
            required: false,
            default: Some(json!(false)),
        }
    }

    /// Convert a loosely-typed value to this field's type where unambiguous.
    ///
    /// Values that cannot be converted are returned unchanged so strict
    /// decoding reports them.
    fn coerce(&self, value: Value) -> Value {
        match (self.field_type, value) {
            (FieldType::Int, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(n) => json!(n),
                Err(_) => Value::String(s),
            },
            (FieldType::Bool, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" | "" => Value::Bool(false),
                _ => Value::String(s),
            },
            (FieldType::String, Value::Number(n)) => Value::String(n.to_string()),
            (FieldType::String, Value::Bool(b)) => Value::String(b.to_string()),
            (_, value) => value,
        }
    }
}

/// Endpoints served by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    Config,
    Object,
    Query,
}

impl PathKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Object => "object",
            Self::Query => "query",
        }
    }
}

#[derive(Debug)]
pub struct PathSpec {
    pub kind: PathKind,
    pub pattern: Regex,
    pub fields: Vec<FieldSchema>,
    pub operations: &'static [Operation],
    pub existence_check: bool,
    pub synopsis: &'static str,
    pub description: &'static str,
}

impl PathSpec {
    pub fn supports(&self, operation: Operation) -> bool {
        operation == Operation::Help || self.operations.contains(&operation)
    }

    pub fn help(&self) -> Response {
        let mut data = Map::new();
        data.insert("path".into(), json!(self.pattern.as_str()));
        data.insert("synopsis".into(), json!(self.synopsis.trim()));
        data.insert("description".into(), json!(self.description.trim()));
        data.insert("operations".into(), json!(self.operations));
        data.insert("fields".into(), json!(self.fields));
        Response::new(data)
    }

    /// Apply schema coercion to every known field in `data`.
    pub fn coerce_fields(&self, data: &mut Map<String, Value>) {
        for field in &self.fields {
            if let Some(value) = data.remove(field.name) {
                data.insert(field.name.to_string(), field.coerce(value));
            }
        }
    }
}

pub const BACKEND_HELP: &str = "
The CyberArk Central Credential Provider (CCP) backend lets callers retrieve
secrets stored in the Enterprise Password Vault without talking to the CCP web
service directly.

After mounting the backend, configure it through the \"config\" endpoint.
";

const CONFIG_SYNOPSIS: &str =
    "Configure the Central Credential Provider web service and authentication information.";
const CONFIG_DESCRIPTION: &str = "
Configures the connection to the Central Credential Provider web service. A
write replaces the whole configuration and takes effect for all subsequent
requests. Reads return every field except client_key.
";

const OBJECT_SYNOPSIS: &str = "Retrieve a secret by safe, folder and object.";
const OBJECT_DESCRIPTION: &str = "
Requests a single account from the Central Credential Provider web service,
addressed as object/<safe>/[<folder>/...]/<object>. Everything between the safe
and the last segment is the folder.
";

const QUERY_SYNOPSIS: &str = "Search for a secret by account properties.";
const QUERY_DESCRIPTION: &str = "
Searches the Central Credential Provider web service for one account matching
the given properties. query_format selects exact matching (default) or regular
expressions.
";

fn location_fields() -> Vec<FieldSchema> {
    vec![
        FieldSchema::string("safe", "The name of the safe where the secret is stored."),
        FieldSchema::string("folder", "The name of the folder where the secret is stored."),
        FieldSchema::string("object", "The name of the secret object to retrieve."),
    ]
}

fn reason_field() -> FieldSchema {
    FieldSchema::string("reason", "The reason for retrieving the password.")
}

pub static PATHS: LazyLock<Vec<PathSpec>> = LazyLock::new(|| {
    vec![
        PathSpec {
            kind: PathKind::Config,
            pattern: Regex::new(r"^config$").expect("config path pattern"),
            fields: vec![
                FieldSchema::string("host", "Host or host:port of the CCP web service.").required(),
                FieldSchema::string(
                    "application_id",
                    "Application ID that identifies this backend to the CCP web service.",
                )
                .required(),
                FieldSchema::int(
                    "connection_timeout",
                    "Seconds the Central Credential Provider may spend retrieving the password.",
                    30,
                ),
                FieldSchema::bool(
                    "fail_request_on_password_change",
                    "Fail the request while a password change is in progress.",
                ),
                FieldSchema::string(
                    "client_cert",
                    "PEM encoded client certificate used to authenticate to the CCP web service.",
                ),
                FieldSchema::string("client_key", "PEM encoded private key of client_cert."),
                FieldSchema::bool(
                    "skip_tls_verify",
                    "Skip verification of the CCP web service server certificate.",
                ),
                FieldSchema::bool(
                    "enable_tls_renegotiation",
                    "Allow the server to renegotiate the TLS session.",
                ),
                FieldSchema::string(
                    "root_ca",
                    "PEM encoded certificate or bundle used to verify the server certificate.",
                ),
            ],
            operations: &[Operation::Read, Operation::Create, Operation::Update],
            existence_check: true,
            synopsis: CONFIG_SYNOPSIS,
            description: CONFIG_DESCRIPTION,
        },
        PathSpec {
            kind: PathKind::Object,
            pattern: Regex::new(r"^object/(?P<safe>[^/]+)/(?:(?P<folder>.*)/)?(?P<object>[^/]+)$")
                .expect("object path pattern"),
            fields: {
                let mut fields = location_fields();
                fields.push(reason_field());
                fields
            },
            operations: &[Operation::Read],
            existence_check: false,
            synopsis: OBJECT_SYNOPSIS,
            description: OBJECT_DESCRIPTION,
        },
        PathSpec {
            kind: PathKind::Query,
            pattern: Regex::new(r"^query$").expect("query path pattern"),
            fields: {
                let mut fields = location_fields();
                fields.extend([
                    FieldSchema::string("username", "Match on the UserName account property."),
                    FieldSchema::string("address", "Match on the Address account property."),
                    FieldSchema::string("database", "Match on the Database account property."),
                    FieldSchema::string("policy_id", "Match on the PolicyID account property."),
                    reason_field(),
                    FieldSchema::string(
                        "query_format",
                        "How criteria are matched: exact (default) or regex.",
                    ),
                ]);
                fields
            },
            operations: &[Operation::Read],
            existence_check: false,
            synopsis: QUERY_SYNOPSIS,
            description: QUERY_DESCRIPTION,
        },
    ]
});

/// A path resolved against [`PATHS`], with its named captures.
#[derive(Debug)]
pub struct RouteMatch {
    pub spec: &'static PathSpec,
    pub captures: Map<String, Value>,
}

/// Resolve a mount-relative path.
///
/// Every named group is captured; an unmatched optional group yields `""` so
/// the path, not the request data, decides its value.
pub fn route(path: &str) -> Option<RouteMatch> {
    let path = path.trim_start_matches('/');
    PATHS.iter().find_map(|spec| {
        let caps = spec.pattern.captures(path)?;
        let captures = spec
            .pattern
            .capture_names()
            .flatten()
            .map(|name| {
                let value = caps.name(name).map_or("", |m| m.as_str());
                (name.to_string(), Value::String(value.to_string()))
            })
            .collect();
        Some(RouteMatch { spec, captures })
    })
}

/// Help for the whole mount.
pub fn backend_help() -> Response {
    let mut data = Map::new();
    data.insert("help".into(), json!(BACKEND_HELP.trim()));
    data.insert(
        "paths".into(),
        json!(PATHS.iter().map(|p| p.pattern.as_str()).collect::<Vec<_>>()),
    );
    Response::new(data)
}
