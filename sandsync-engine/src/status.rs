//! Sync status machine and observable snapshots

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::conflict::Conflict;

/// Process-wide synchronization status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    /// Queue empty, no conflicts
    Idle,
    /// Draining the pending queue
    Syncing,
    /// A push failed at the network level; queue retained for retry
    Offline,
    /// At least one unresolved conflict; draining is halted
    Conflict,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Idle
    }
}

/// Read-only broadcast value: status plus pending count and the
/// current conflict list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSnapshot {
    pub status: SyncStatus,
    pub pending: usize,
    pub conflicts: Vec<Conflict>,
}

/// Broadcasts snapshots to any number of subscribers
pub struct StatusPublisher {
    tx: watch::Sender<SyncSnapshot>,
}

impl StatusPublisher {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SyncSnapshot::default());
        Self { tx }
    }

    /// Subscribe; the receiver immediately holds the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.tx.subscribe()
    }

    /// Publish a new snapshot if it differs from the last one
    pub fn publish(&self, snapshot: SyncSnapshot) {
        self.tx.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    /// Latest published snapshot
    pub fn current(&self) -> SyncSnapshot {
        self.tx.borrow().clone()
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_see_latest_snapshot() {
        let publisher = StatusPublisher::new();
        publisher.publish(SyncSnapshot {
            status: SyncStatus::Syncing,
            pending: 3,
            conflicts: vec![],
        });

        let rx = publisher.subscribe();
        assert_eq!(rx.borrow().status, SyncStatus::Syncing);
        assert_eq!(rx.borrow().pending, 3);
    }

    #[tokio::test]
    async fn test_unchanged_snapshot_not_rebroadcast() {
        let publisher = StatusPublisher::new();
        let mut rx = publisher.subscribe();
        rx.borrow_and_update();

        publisher.publish(SyncSnapshot::default());
        assert!(!rx.has_changed().unwrap());

        publisher.publish(SyncSnapshot {
            status: SyncStatus::Offline,
            pending: 1,
            conflicts: vec![],
        });
        assert!(rx.has_changed().unwrap());
    }
}
