//! In-memory remote store (for testing)
//!
//! Mirrors the REST semantics of `HttpRemote` against a HashMap, with a
//! reachability toggle so tests can simulate connectivity loss and
//! concurrent remote edits.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::client::{RemoteEntry, RemoteStore};
use crate::errors::{RemoteError, Result};

#[derive(Debug, Clone)]
struct Node {
    is_dir: bool,
    content: String,
}

/// In-memory `RemoteStore` implementation
#[derive(Default)]
pub struct MemoryRemote {
    files: RwLock<BTreeMap<String, Node>>,
    unreachable: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated connectivity. While unreachable every operation
    /// fails the way a dead network would.
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Write a file directly, as a concurrent remote editor would
    pub async fn insert_file(&self, path: &str, content: &str) {
        self.files.write().await.insert(
            path.to_string(),
            Node {
                is_dir: false,
                content: content.to_string(),
            },
        );
    }

    /// Create a folder entry directly
    pub async fn insert_folder(&self, path: &str) {
        self.files.write().await.insert(
            path.to_string(),
            Node {
                is_dir: true,
                content: String::new(),
            },
        );
    }

    /// Current content of a file, if present
    pub async fn file_content(&self, path: &str) -> Option<String> {
        self.files
            .read()
            .await
            .get(path)
            .filter(|n| !n.is_dir)
            .map(|n| n.content.clone())
    }

    /// Whether any entry exists at the path
    pub async fn contains(&self, path: &str) -> bool {
        self.files.read().await.contains_key(path)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            Err(RemoteError::Unreachable("simulated outage".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn get_file(&self, path: &str) -> Result<Option<String>> {
        self.check_reachable()?;
        Ok(self
            .files
            .read()
            .await
            .get(path)
            .filter(|n| !n.is_dir)
            .map(|n| n.content.clone()))
    }

    async fn put_file(&self, path: &str, content: &str) -> Result<()> {
        self.check_reachable()?;
        self.files.write().await.insert(
            path.to_string(),
            Node {
                is_dir: false,
                content: content.to_string(),
            },
        );
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> Result<()> {
        self.check_reachable()?;
        let prefix = format!("{path}/");
        self.files
            .write()
            .await
            .retain(|p, _| p != path && !p.starts_with(&prefix));
        Ok(())
    }

    async fn create_path(&self, path: &str, is_folder: bool) -> Result<()> {
        self.check_reachable()?;
        let mut files = self.files.write().await;
        files.entry(path.to_string()).or_insert(Node {
            is_dir: is_folder,
            content: String::new(),
        });
        Ok(())
    }

    async fn pull_all(&self) -> Result<Vec<RemoteEntry>> {
        self.check_reachable()?;
        Ok(self
            .files
            .read()
            .await
            .iter()
            .map(|(path, node)| RemoteEntry {
                path: path.clone(),
                is_dir: node.is_dir,
                content: (!node.is_dir).then(|| node.content.clone()),
            })
            .collect())
    }
}
