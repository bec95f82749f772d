//! Sandbox-backed virtual filesystem with change notification
//!
//! `SandboxFs` confines all file operations to a root directory and
//! notifies subscribers of changes through a broadcast channel.
//! Explicit API calls (`write_file`, `create`, `delete`, `rename`) emit
//! their event synchronously before returning; a periodic polling task
//! additionally diffs flat tree snapshots to catch files created or
//! removed by other actors inside the sandbox.
//!
//! Polling observes presence/absence only: content modifications made
//! outside the explicit API are not detected. Callers that need
//! content-change events must go through `write_file`. This asymmetry
//! is part of the contract; see `VfsConfig::native_events` for
//! environments where real OS notification is available.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tokio::sync::{broadcast, Mutex, OnceCell, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::errors::{Result, VfsError};
use crate::filter::is_ignored_path;
use crate::native::NativeWatcher;

/// File system change event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VfsEvent {
    /// File or directory appeared
    Created { path: String, is_folder: bool },
    /// File content written through the explicit API
    Updated { path: String },
    /// File or directory removed
    Deleted { path: String },
}

impl VfsEvent {
    /// Path the event refers to
    pub fn path(&self) -> &str {
        match self {
            VfsEvent::Created { path, .. }
            | VfsEvent::Updated { path }
            | VfsEvent::Deleted { path } => path,
        }
    }
}

/// Entry in a flat tree listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VfsEntry {
    /// Sandbox-relative path, forward slashes
    pub path: String,
    pub is_dir: bool,
}

/// Configuration for the sandbox filesystem
#[derive(Debug, Clone)]
pub struct VfsConfig {
    /// Interval between polling snapshots (default: 2s)
    pub poll_interval: Duration,
    /// Use a notify-based OS watcher in addition to polling. Off by
    /// default; polling-only is the baseline contract for sandboxes
    /// without native recursive notification.
    pub native_events: bool,
    /// Broadcast channel capacity for change events
    pub event_capacity: usize,
}

impl Default for VfsConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            native_events: false,
            event_capacity: 256,
        }
    }
}

/// Sandboxed virtual filesystem
pub struct SandboxFs {
    root: PathBuf,
    config: VfsConfig,
    events: broadcast::Sender<VfsEvent>,
    snapshot: Arc<RwLock<HashSet<String>>>,
    ready: OnceCell<()>,
    poll_task: Mutex<Option<JoinHandle<()>>>,
    native: Mutex<Option<NativeWatcher>>,
}

impl SandboxFs {
    /// Create a filesystem rooted at `root`. The directory is created
    /// on `ensure_ready`.
    pub fn new(root: impl Into<PathBuf>, config: VfsConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(config.event_capacity);
        Arc::new(Self {
            root: root.into(),
            config,
            events,
            snapshot: Arc::new(RwLock::new(HashSet::new())),
            ready: OnceCell::new(),
            poll_task: Mutex::new(None),
            native: Mutex::new(None),
        })
    }

    /// Sandbox root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root, take the initial snapshot, and start change
    /// detection. Idempotent.
    pub async fn ensure_ready(&self) -> Result<()> {
        self.ready
            .get_or_try_init(|| async {
                fs::create_dir_all(&self.root).await?;
                let initial = self.snapshot_paths().await?;
                *self.snapshot.write().await = initial;
                self.start_polling().await;
                if self.config.native_events {
                    let watcher = NativeWatcher::start(&self.root, self.events.clone())?;
                    *self.native.lock().await = Some(watcher);
                }
                info!("Sandbox filesystem ready at {}", self.root.display());
                Ok::<(), VfsError>(())
            })
            .await?;
        Ok(())
    }

    /// Subscribe to change events. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<VfsEvent> {
        self.events.subscribe()
    }

    /// Flat recursive listing of the whole tree
    pub async fn list(&self) -> Result<Vec<VfsEntry>> {
        walk_tree(&self.root).await
    }

    /// Read a file as UTF-8 text
    pub async fn read_file(&self, path: &str) -> Result<String> {
        let abs = self.absolute(path)?;
        match fs::read_to_string(&abs).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(VfsError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write a file, creating parent directories as needed. Emits
    /// `Updated` synchronously.
    pub async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        let abs = self.absolute(path)?;
        if let Some(parent) = abs.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&abs, content).await?;
        self.emit(VfsEvent::Updated {
            path: normalize(path),
        });
        Ok(())
    }

    /// Create an empty file or a directory. Emits `Created`.
    pub async fn create(&self, path: &str, is_folder: bool) -> Result<()> {
        let abs = self.absolute(path)?;
        if is_folder {
            fs::create_dir_all(&abs).await?;
        } else {
            if let Some(parent) = abs.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::write(&abs, "").await?;
        }
        self.refresh_snapshot().await;
        self.emit(VfsEvent::Created {
            path: normalize(path),
            is_folder,
        });
        Ok(())
    }

    /// Delete a file or directory (recursively). Emits `Deleted`.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let abs = self.absolute(path)?;
        let meta = match fs::metadata(&abs).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VfsError::NotFound(path.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        if meta.is_dir() {
            fs::remove_dir_all(&abs).await?;
        } else {
            fs::remove_file(&abs).await?;
        }
        self.refresh_snapshot().await;
        self.emit(VfsEvent::Deleted {
            path: normalize(path),
        });
        Ok(())
    }

    /// Rename a file or directory. Emits `Deleted` for the old path and
    /// `Created` for the new one.
    pub async fn rename(&self, old_path: &str, new_path: &str) -> Result<()> {
        let from = self.absolute(old_path)?;
        let to = self.absolute(new_path)?;
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::rename(&from, &to).await?;
        let is_folder = fs::metadata(&to)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        self.refresh_snapshot().await;
        self.emit(VfsEvent::Deleted {
            path: normalize(old_path),
        });
        self.emit(VfsEvent::Created {
            path: normalize(new_path),
            is_folder,
        });
        Ok(())
    }

    /// Re-baseline the polling snapshot so current tree contents are
    /// not re-announced as created. Used after a bulk seed pull.
    pub async fn refresh_snapshot(&self) {
        match self.snapshot_paths().await {
            Ok(snap) => *self.snapshot.write().await = snap,
            Err(e) => warn!("Failed to refresh snapshot: {}", e),
        }
    }

    /// Stop the polling task and any native watcher
    pub async fn shutdown(&self) {
        if let Some(task) = self.poll_task.lock().await.take() {
            task.abort();
        }
        self.native.lock().await.take();
        debug!("Sandbox filesystem stopped for {}", self.root.display());
    }

    /// Snapshot of all non-ignored paths; folders carry a trailing `/`
    /// marker so a file replacing a folder of the same name diffs as a
    /// change.
    async fn snapshot_paths(&self) -> Result<HashSet<String>> {
        scan_paths(&self.root).await
    }

    async fn start_polling(&self) {
        let mut guard = self.poll_task.lock().await;
        if guard.is_some() {
            return;
        }
        let root = self.root.clone();
        let events = self.events.clone();
        let snapshot = Arc::clone(&self.snapshot);
        let interval = self.config.poll_interval;
        *guard = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // first tick fires immediately
            loop {
                ticker.tick().await;
                // Errors here are swallowed so a transient failure
                // cannot kill the polling loop; the next tick will
                // reconcile presence/absence drift.
                let now = match scan_paths(&root).await {
                    Ok(now) => now,
                    Err(e) => {
                        warn!("Polling snapshot failed: {}", e);
                        continue;
                    }
                };
                let previous = snapshot.read().await.clone();
                for path in now.difference(&previous) {
                    let is_folder = path.ends_with('/');
                    let _ = events.send(VfsEvent::Created {
                        path: path.trim_end_matches('/').to_string(),
                        is_folder,
                    });
                }
                for path in previous.difference(&now) {
                    let _ = events.send(VfsEvent::Deleted {
                        path: path.trim_end_matches('/').to_string(),
                    });
                }
                *snapshot.write().await = now;
            }
        }));
    }

    fn emit(&self, event: VfsEvent) {
        if is_ignored_path(event.path()) {
            return;
        }
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn absolute(&self, path: &str) -> Result<PathBuf> {
        let rel = normalize(path);
        if rel.is_empty() {
            return Err(VfsError::InvalidPath(path.to_string()));
        }
        if rel.split('/').any(|seg| seg == "..") {
            return Err(VfsError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(rel))
    }
}

/// Strip leading slashes so paths are sandbox-relative
fn normalize(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

/// Flat recursive listing of `root`, paths relative with forward
/// slashes
async fn walk_tree(root: &Path) -> Result<Vec<VfsEntry>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_dir = entry.file_type().await?.is_dir();
            let rel = path
                .strip_prefix(root)
                .ok()
                .map(|rel| rel.to_string_lossy().replace('\\', "/"))
                .filter(|rel| !rel.is_empty());
            if let Some(rel) = rel {
                out.push(VfsEntry { path: rel, is_dir });
            }
            if is_dir {
                stack.push(path);
            }
        }
    }
    Ok(out)
}

/// Non-ignored paths under `root` as a diffable set, folders marked
/// with a trailing `/`
async fn scan_paths(root: &Path) -> Result<HashSet<String>> {
    let entries = walk_tree(root).await?;
    Ok(entries
        .into_iter()
        .filter(|e| !is_ignored_path(&e.path))
        .map(|e| {
            if e.is_dir {
                format!("{}/", e.path)
            } else {
                e.path
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::time::sleep;

    fn fast_config() -> VfsConfig {
        VfsConfig {
            poll_interval: Duration::from_millis(100),
            ..Default::default()
        }
    }

    fn drain(rx: &mut broadcast::Receiver<VfsEvent>) -> Vec<VfsEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[tokio::test]
    async fn test_write_emits_updated() {
        let dir = tempdir().unwrap();
        let fs = SandboxFs::new(dir.path(), fast_config());
        fs.ensure_ready().await.unwrap();

        let mut rx = fs.subscribe();
        fs.write_file("src/main.rs", "fn main() {}").await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![VfsEvent::Updated {
                path: "src/main.rs".to_string()
            }]
        );
        assert_eq!(fs.read_file("src/main.rs").await.unwrap(), "fn main() {}");
    }

    #[tokio::test]
    async fn test_create_and_delete_events() {
        let dir = tempdir().unwrap();
        let fs = SandboxFs::new(dir.path(), fast_config());
        fs.ensure_ready().await.unwrap();

        let mut rx = fs.subscribe();
        fs.create("assets", true).await.unwrap();
        fs.create("assets/logo.svg", false).await.unwrap();
        fs.delete("assets/logo.svg").await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                VfsEvent::Created {
                    path: "assets".to_string(),
                    is_folder: true
                },
                VfsEvent::Created {
                    path: "assets/logo.svg".to_string(),
                    is_folder: false
                },
                VfsEvent::Deleted {
                    path: "assets/logo.svg".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_rename_emits_delete_then_create() {
        let dir = tempdir().unwrap();
        let fs = SandboxFs::new(dir.path(), fast_config());
        fs.ensure_ready().await.unwrap();
        fs.write_file("a.txt", "x").await.unwrap();

        let mut rx = fs.subscribe();
        fs.rename("a.txt", "b.txt").await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                VfsEvent::Deleted {
                    path: "a.txt".to_string()
                },
                VfsEvent::Created {
                    path: "b.txt".to_string(),
                    is_folder: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_polling_detects_external_changes() {
        let dir = tempdir().unwrap();
        let fs = SandboxFs::new(dir.path(), fast_config());
        fs.ensure_ready().await.unwrap();

        let mut rx = fs.subscribe();
        // Bypass the explicit API, as a package installer would
        std::fs::write(dir.path().join("external.txt"), "hi").unwrap();
        sleep(Duration::from_millis(400)).await;

        let events = drain(&mut rx);
        assert!(events.contains(&VfsEvent::Created {
            path: "external.txt".to_string(),
            is_folder: false
        }));

        std::fs::remove_file(dir.path().join("external.txt")).unwrap();
        sleep(Duration::from_millis(400)).await;

        let events = drain(&mut rx);
        assert!(events.contains(&VfsEvent::Deleted {
            path: "external.txt".to_string()
        }));

        fs.shutdown().await;
    }

    #[tokio::test]
    async fn test_ignored_paths_not_emitted() {
        let dir = tempdir().unwrap();
        let fs = SandboxFs::new(dir.path(), fast_config());
        fs.ensure_ready().await.unwrap();

        let mut rx = fs.subscribe();
        fs.write_file("node_modules/pkg/index.js", "x").await.unwrap();
        fs.write_file(".secrets", "x").await.unwrap();
        fs.write_file(".env", "KEY=1").await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![VfsEvent::Updated {
                path: ".env".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_list_and_snapshot_markers() {
        let dir = tempdir().unwrap();
        let fs = SandboxFs::new(dir.path(), fast_config());
        fs.ensure_ready().await.unwrap();
        fs.create("src", true).await.unwrap();
        fs.write_file("src/lib.rs", "").await.unwrap();

        let mut listed = fs.list().await.unwrap();
        listed.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(
            listed,
            vec![
                VfsEntry {
                    path: "src".to_string(),
                    is_dir: true
                },
                VfsEntry {
                    path: "src/lib.rs".to_string(),
                    is_dir: false
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_rejects_path_escape() {
        let dir = tempdir().unwrap();
        let fs = SandboxFs::new(dir.path(), fast_config());
        fs.ensure_ready().await.unwrap();

        assert!(matches!(
            fs.read_file("../outside.txt").await,
            Err(VfsError::InvalidPath(_))
        ));
    }
}
