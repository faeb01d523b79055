use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use crate::storage::Storage;

/// Operation requested on a backend path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Create,
    Update,
    Help,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Help => "help",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound request as dispatched by the host.
#[derive(Clone)]
pub struct Request {
    pub operation: Operation,
    /// Path relative to the mount, without a leading slash.
    pub path: String,
    pub data: Map<String, Value>,
    pub storage: Arc<dyn Storage>,
    /// Cancelled by the host when the caller goes away.
    pub cancel: CancellationToken,
}

impl Request {
    pub fn new(operation: Operation, path: impl Into<String>, storage: Arc<dyn Storage>) -> Self {
        let path = path.into();
        Self {
            operation,
            path: path.trim_start_matches('/').to_string(),
            data: Map::new(),
            storage,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("operation", &self.operation)
            .field("path", &self.path)
            .field("fields", &self.data.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// A response returned to the caller.
#[derive(Clone, Default, PartialEq, Serialize)]
pub struct Response {
    pub data: Map<String, Value>,
}

impl Response {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    /// A caller-visible error response.
    pub fn error(message: impl Into<String>) -> Self {
        let mut data = Map::new();
        data.insert("error".to_string(), Value::String(message.into()));
        Self { data }
    }

    pub fn is_error(&self) -> bool {
        self.data.contains_key("error")
    }

    pub fn error_message(&self) -> Option<&str> {
        self.data.get("error").and_then(Value::as_str)
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (key, value) in &self.data {
            match key.as_str() {
                "content" | "client_key" => map.entry(key, &"[REDACTED]"),
                _ => map.entry(key, value),
            };
        }
        map.finish()
    }
}
