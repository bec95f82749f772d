//! Native OS change notification bridge
//!
//! Sandboxes without recursive change notification rely on the polling
//! watcher, which only observes presence/absence. When the sandbox root
//! lives on a filesystem with real OS-level events, `NativeWatcher`
//! bridges notify events into the same `VfsEvent` stream, including
//! content modifications made by other processes.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::errors::{Result, VfsError};
use crate::filter::is_ignored_path;
use crate::sandbox::VfsEvent;

/// Notify-backed change source feeding a `VfsEvent` broadcast channel
pub struct NativeWatcher {
    _watcher: RecommendedWatcher,
}

impl NativeWatcher {
    /// Start watching `root` recursively, forwarding converted events
    /// to `events`. The watcher stops when the returned value drops.
    pub fn start(root: &Path, events: broadcast::Sender<VfsEvent>) -> Result<Self> {
        let root = root
            .canonicalize()
            .map_err(|e| VfsError::Watcher(e.to_string()))?;
        let event_root = root.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for vfs_event in convert_event(&event_root, &event) {
                        if !is_ignored_path(vfs_event.path()) {
                            let _ = events.send(vfs_event);
                        }
                    }
                }
                Err(e) => {
                    error!("Native watcher error: {}", e);
                }
            })
            .map_err(|e| VfsError::Watcher(e.to_string()))?;
        watcher
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| VfsError::Watcher(e.to_string()))?;
        info!("Native change notification active for {}", root.display());
        Ok(Self { _watcher: watcher })
    }
}

/// Convert a notify event into sandbox-relative `VfsEvent`s
fn convert_event(root: &PathBuf, event: &Event) -> Vec<VfsEvent> {
    let mut out = Vec::new();
    for path in &event.paths {
        let Some(rel) = path
            .strip_prefix(root)
            .ok()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .filter(|p| !p.is_empty())
        else {
            continue;
        };
        match event.kind {
            EventKind::Create(_) => out.push(VfsEvent::Created {
                is_folder: path.is_dir(),
                path: rel,
            }),
            EventKind::Modify(_) => out.push(VfsEvent::Updated { path: rel }),
            EventKind::Remove(_) => out.push(VfsEvent::Deleted { path: rel }),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_native_watcher_sees_external_write() {
        let dir = tempdir().unwrap();
        let (tx, mut rx) = broadcast::channel(64);
        let _watcher = NativeWatcher::start(dir.path(), tx).unwrap();

        sleep(Duration::from_millis(100)).await;
        std::fs::write(dir.path().join("note.txt"), "hello").unwrap();
        sleep(Duration::from_millis(300)).await;

        let mut saw_note = false;
        while let Ok(ev) = rx.try_recv() {
            if ev.path() == "note.txt" {
                saw_note = true;
            }
        }
        assert!(saw_note);
    }

    #[test]
    fn test_convert_filters_root() {
        let root = PathBuf::from("/sandbox");
        let event = Event {
            kind: EventKind::Remove(notify::event::RemoveKind::File),
            paths: vec![PathBuf::from("/sandbox/a/b.txt"), PathBuf::from("/other")],
            attrs: Default::default(),
        };
        let converted = convert_event(&root, &event);
        assert_eq!(
            converted,
            vec![VfsEvent::Deleted {
                path: "a/b.txt".to_string()
            }]
        );
    }
}
