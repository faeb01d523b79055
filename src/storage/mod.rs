//! # Host Storage
//!
//! The durable key-value storage the host hands to the backend. Entries are
//! opaque bytes addressed by key; writes are atomic per key and reads are
//! strongly consistent for a single mount.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::InMemoryStorage;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::errors::Result;

/// A single stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub key: String,
    pub value: Vec<u8>,
}

impl StorageEntry {
    /// Create an entry holding raw bytes.
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self { key: key.into(), value }
    }

    /// Create an entry holding the JSON encoding of `value`.
    pub fn json<T: Serialize>(key: impl Into<String>, value: &T) -> Result<Self> {
        Ok(Self { key: key.into(), value: serde_json::to_vec(value)? })
    }

    /// Decode the entry's bytes as JSON.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.value)?)
    }
}

/// Storage contract consumed from the host.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch the entry stored at `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>>;

    /// Create or replace the entry at `entry.key`.
    async fn put(&self, entry: StorageEntry) -> Result<()>;

    /// Remove the entry at `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// List keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;
}
