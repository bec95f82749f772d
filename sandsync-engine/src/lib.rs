//! Synchronization engine for sandsync
//!
//! This crate provides the central synchronization engine that keeps a
//! sandboxed virtual filesystem consistent with a remote project store:
//! - Pending-change queue with per-path coalescing and debounced drains
//! - Optimistic-concurrency conflict detection via content hashing
//! - Conflict store with explicit keep-local / keep-remote resolution
//! - Online/offline/conflict status machine with observable snapshots
//! - Durable queue and hash-cache state that survives restarts

pub mod change;
pub mod conflict;
pub mod connectivity;
pub mod engine;
pub mod errors;
pub mod hash;
pub mod queue;
pub mod status;
pub mod store;

pub use change::{Change, ChangeOp};
pub use conflict::{Conflict, ConflictChoice};
pub use connectivity::{AlwaysOnline, Connectivity, SharedConnectivity};
pub use engine::{SyncConfig, SyncEngine};
pub use errors::{Result, SyncError};
pub use hash::content_hash;
pub use queue::PendingQueue;
pub use status::{StatusPublisher, SyncSnapshot, SyncStatus};
pub use store::{FileStateStore, MemoryStateStore, StateStore};
