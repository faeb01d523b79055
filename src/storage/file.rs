use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{Storage, StorageEntry};
use crate::errors::{Error, Result};

/// One file per key under a root directory.
///
/// Puts write a temporary sibling and rename it over the target, so readers
/// never observe a partially written entry.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) storage rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && relative.components().all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(Error::storage(format!("invalid storage key '{key}'")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<StorageEntry>> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(value) => Ok(Some(StorageEntry::new(key, value))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::storage(format!("failed to read '{key}': {e}"))),
        }
    }

    async fn put(&self, entry: StorageEntry) -> Result<()> {
        let path = self.path_for(&entry.key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        fs::write(&tmp, &entry.value)
            .await
            .map_err(|e| Error::storage(format!("failed to write '{}': {e}", entry.key)))?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(Error::storage(format!("failed to commit '{}': {e}", entry.key)));
        }

        debug!(key = %entry.key, bytes = entry.value.len(), "storage entry written");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage(format!("failed to delete '{key}': {e}"))),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Ok(relative) = path.strip_prefix(&self.root) else { continue };
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                if key.contains(".tmp-") {
                    continue;
                }
                if key.starts_with(prefix) {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }
}
