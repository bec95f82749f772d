//! Durable key-value state storage
//!
//! The serialized pending queue, the remote hash cache, and the
//! one-time seed marker must survive restarts. The store is injected so
//! the engine runs the same in a desktop sandbox host, a server, or a
//! test harness.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;

use crate::errors::{Result, SyncError};

/// Keyed durable storage for engine state
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn put(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed store: one file per key under a state directory
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| SyncError::Storage(format!("failed to create state dir: {e}")))?;
        Ok(Self { dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        // Keys are dotted identifiers; keep them filesystem-safe
        let safe: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            })
            .collect();
        self.dir.join(safe)
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.key_path(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::Storage(format!("failed to read {key}: {e}"))),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        fs::write(self.key_path(key), value)
            .await
            .map_err(|e| SyncError::Storage(format!("failed to write {key}: {e}")))?;
        debug!("Persisted state key: {}", key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.key_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Storage(format!("failed to remove {key}: {e}"))),
        }
    }
}

/// In-memory store (for testing)
#[derive(Default)]
pub struct MemoryStateStore {
    map: RwLock<HashMap<String, String>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.map.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.map
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.map.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_store_roundtrip() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::open(dir.path()).await.unwrap();

        assert_eq!(store.get("sync.queue.v1").await.unwrap(), None);
        store.put("sync.queue.v1", "[]").await.unwrap();
        assert_eq!(
            store.get("sync.queue.v1").await.unwrap(),
            Some("[]".to_string())
        );

        store.remove("sync.queue.v1").await.unwrap();
        assert_eq!(store.get("sync.queue.v1").await.unwrap(), None);
        // Removing a missing key is not an error
        store.remove("sync.queue.v1").await.unwrap();
    }

    #[tokio::test]
    async fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileStateStore::open(dir.path()).await.unwrap();
            store.put("seed.done", "1").await.unwrap();
        }
        let store = FileStateStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get("seed.done").await.unwrap(), Some("1".to_string()));
    }

    #[tokio::test]
    async fn test_unsafe_key_characters_sanitized() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::open(dir.path()).await.unwrap();
        store.put("odd/key:name", "v").await.unwrap();
        assert_eq!(
            store.get("odd/key:name").await.unwrap(),
            Some("v".to_string())
        );
    }
}
