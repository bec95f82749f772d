//! Connectivity signal abstraction
//!
//! Replaces browser-global online/offline events with an injected
//! capability: the engine polls `is_online` before draining and
//! subscribes to restoration transitions to resume automatically.

use std::sync::Arc;

use tokio::sync::watch;

/// Source of the online/offline signal
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;

    /// Receiver that observes online-state transitions. The default
    /// source never changes state.
    fn subscribe(&self) -> watch::Receiver<bool>;
}

/// Connectivity source that always reports online
pub struct AlwaysOnline {
    tx: watch::Sender<bool>,
}

impl AlwaysOnline {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(true);
        Self { tx }
    }
}

impl Default for AlwaysOnline {
    fn default() -> Self {
        Self::new()
    }
}

impl Connectivity for AlwaysOnline {
    fn is_online(&self) -> bool {
        true
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Shared flag an embedder flips when the environment reports a
/// connectivity change
pub struct SharedConnectivity {
    tx: Arc<watch::Sender<bool>>,
}

impl SharedConnectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_online(&self, online: bool) {
        let _ = self.tx.send(online);
    }
}

impl Clone for SharedConnectivity {
    fn clone(&self) -> Self {
        Self {
            tx: Arc::clone(&self.tx),
        }
    }
}

impl Connectivity for SharedConnectivity {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}
