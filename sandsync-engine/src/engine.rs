//! Synchronization engine
//!
//! Consumes watcher events from the sandbox filesystem, coalesces them
//! into a debounced pending queue, and drives pushes through the remote
//! store with an optimistic-concurrency conflict check per change.
//! Draining is strictly sequential: one change at a time, front of the
//! queue first. A hash mismatch halts the entire queue until every
//! conflict is resolved; a network failure parks the engine offline
//! with the queue retained for retry.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sandsync_remote::RemoteStore;
use sandsync_vfs::{SandboxFs, VfsEvent};

use crate::change::{Change, ChangeOp};
use crate::conflict::{Conflict, ConflictChoice};
use crate::connectivity::Connectivity;
use crate::errors::{Result, SyncError};
use crate::hash::content_hash;
use crate::queue::PendingQueue;
use crate::status::{StatusPublisher, SyncSnapshot, SyncStatus};
use crate::store::StateStore;

/// Durable store key for the serialized pending queue
const QUEUE_KEY: &str = "sync.queue.v1";
/// Durable store key for the remote hash cache
const HASH_KEY: &str = "sync.hash.v1";
/// Durable store key for the one-time seed marker
const SEED_KEY: &str = "seed.done";

/// Configuration for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet period after the last enqueue before the queue drains
    /// (default: 500ms)
    pub debounce: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

/// Engine state mutated only inside the single processing flow
struct EngineState {
    queue: PendingQueue,
    hashes: HashMap<String, u32>,
    conflicts: Vec<Conflict>,
    status: SyncStatus,
    processing: bool,
}

impl EngineState {
    fn new() -> Self {
        Self {
            queue: PendingQueue::new(),
            hashes: HashMap::new(),
            conflicts: Vec::new(),
            status: SyncStatus::Idle,
            processing: false,
        }
    }

    fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            status: self.status,
            pending: self.queue.len(),
            conflicts: self.conflicts.clone(),
        }
    }
}

/// Outcome of pushing a single change
enum PushResult {
    Applied,
    Conflicted { remote_content: String },
}

/// The synchronization engine service
///
/// Construct with injected dependencies, call `init` to start watching
/// and drain any restored queue, and `shutdown` to stop background
/// tasks. Multiple independent instances may coexist.
pub struct SyncEngine {
    // Self-handle for the background tasks the engine spawns
    me: Weak<Self>,
    config: SyncConfig,
    vfs: Arc<SandboxFs>,
    remote: Arc<dyn RemoteStore>,
    store: Arc<dyn StateStore>,
    connectivity: Arc<dyn Connectivity>,
    state: Mutex<EngineState>,
    publisher: StatusPublisher,
    debounce_task: Mutex<Option<JoinHandle<()>>>,
    background: Mutex<Vec<JoinHandle<()>>>,
}

impl SyncEngine {
    pub fn new(
        vfs: Arc<SandboxFs>,
        remote: Arc<dyn RemoteStore>,
        store: Arc<dyn StateStore>,
        connectivity: Arc<dyn Connectivity>,
        config: SyncConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config,
            vfs,
            remote,
            store,
            connectivity,
            state: Mutex::new(EngineState::new()),
            publisher: StatusPublisher::new(),
            debounce_task: Mutex::new(None),
            background: Mutex::new(Vec::new()),
        })
    }

    /// Subscribe to status snapshots. The receiver immediately holds
    /// the latest one; treat snapshots as read-only.
    pub fn subscribe(&self) -> watch::Receiver<SyncSnapshot> {
        self.publisher.subscribe()
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SyncSnapshot {
        self.publisher.current()
    }

    /// Load persisted state, seed an empty sandbox from the remote,
    /// start watching, and drain anything left in the queue.
    pub async fn init(&self) -> Result<()> {
        self.load_state().await;
        self.vfs.ensure_ready().await?;

        let seeded = self.store.get(SEED_KEY).await.ok().flatten().as_deref() == Some("1");
        if !seeded {
            let listing = self.vfs.list().await?;
            if listing.is_empty() {
                // Establish a consistent baseline before any outbound
                // push; failure here is retried on the next init.
                match self.pull_all().await {
                    Ok(()) => {
                        if let Err(e) = self.store.put(SEED_KEY, "1").await {
                            warn!("Failed to persist seed marker: {}", e);
                        }
                    }
                    Err(e) => warn!("Initial seed pull failed: {}", e),
                }
            }
        }

        // Seeded writes must not be re-announced by polling
        self.vfs.refresh_snapshot().await;

        self.spawn_watcher_task().await;
        self.spawn_connectivity_task().await;

        {
            let state = self.state.lock().await;
            self.publisher.publish(state.snapshot());
        }

        info!("Sync engine initialized");
        self.process_queue().await;
        Ok(())
    }

    /// Stop background tasks and the filesystem watcher
    pub async fn shutdown(&self) {
        if let Some(task) = self.debounce_task.lock().await.take() {
            task.abort();
        }
        for task in self.background.lock().await.drain(..) {
            task.abort();
        }
        self.vfs.shutdown().await;
        let state = self.state.lock().await;
        self.persist_queue(&state).await;
        self.persist_hashes(&state).await;
        info!("Sync engine stopped");
    }

    /// Pull the entire remote tree into the sandbox and seed the hash
    /// cache from the pulled content.
    pub async fn pull_all(&self) -> Result<()> {
        let entries = self.remote.pull_all().await?;
        let count = entries.len();
        for entry in entries {
            if entry.is_dir {
                self.vfs.create(&entry.path, true).await?;
            } else {
                let content = entry.content.unwrap_or_default();
                self.vfs.write_file(&entry.path, &content).await?;
                let mut state = self.state.lock().await;
                state.hashes.insert(entry.path.clone(), content_hash(&content));
            }
        }
        let state = self.state.lock().await;
        self.persist_hashes(&state).await;
        info!("Pulled {} entries from remote", count);
        Ok(())
    }

    /// Queue a change for push, coalescing with any queued change for
    /// the same path, and restart the debounce window.
    pub async fn enqueue(&self, change: Change) {
        {
            let mut state = self.state.lock().await;
            debug!("Enqueue {:?} {}", change.op, change.path);
            state.queue.coalesce(change);
            self.persist_queue(&state).await;
            self.publisher.publish(state.snapshot());
        }
        self.restart_debounce().await;
    }

    /// Drain the pending queue sequentially. Single-flight: concurrent
    /// calls while a drain is running return immediately, and
    /// unresolved conflicts keep the whole queue halted no matter what
    /// triggers the drain.
    ///
    /// A change coalesced into the front entry while that entry's push
    /// is in flight gets popped along with it; the debounce window
    /// between enqueue and drain is the only mitigation for that
    /// overlap.
    pub async fn process_queue(&self) {
        {
            let mut state = self.state.lock().await;
            if state.processing {
                return;
            }
            if !state.conflicts.is_empty() {
                // Conflicts halt the whole queue, and a conflicted
                // change no longer sits at the front to block draining
                // on its own; nothing moves until the last one is
                // resolved.
                state.status = SyncStatus::Conflict;
                self.publisher.publish(state.snapshot());
                return;
            }
            if state.queue.is_empty() {
                state.status = SyncStatus::Idle;
                self.publisher.publish(state.snapshot());
                return;
            }
            if !self.connectivity.is_online() {
                state.status = SyncStatus::Offline;
                self.publisher.publish(state.snapshot());
                debug!("Offline, queue retained ({} pending)", state.queue.len());
                return;
            }
            state.processing = true;
            state.status = SyncStatus::Syncing;
            self.publisher.publish(state.snapshot());
        }

        loop {
            let change = {
                let state = self.state.lock().await;
                match state.queue.front() {
                    Some(change) => change.clone(),
                    None => break,
                }
            };

            match self.push_change(&change).await {
                Ok(PushResult::Applied) => {
                    let mut state = self.state.lock().await;
                    match change.op {
                        ChangeOp::Delete => {
                            state.hashes.remove(&change.path);
                        }
                        ChangeOp::Create | ChangeOp::Update => {
                            if let Some(content) = &change.content {
                                state
                                    .hashes
                                    .insert(change.path.clone(), content_hash(content));
                            }
                        }
                    }
                    state.queue.pop_front();
                    self.persist_queue(&state).await;
                    self.persist_hashes(&state).await;
                    self.publisher.publish(state.snapshot());
                }
                Ok(PushResult::Conflicted { remote_content }) => {
                    let mut state = self.state.lock().await;
                    warn!("Conflict detected for {}", change.path);
                    state.conflicts.push(Conflict {
                        path: change.path.clone(),
                        local_content: change.content.clone().unwrap_or_default(),
                        remote_content,
                    });
                    // Downgraded into a conflict: out of the queue, into
                    // the conflict store
                    state.queue.pop_front();
                    self.persist_queue(&state).await;
                    state.status = SyncStatus::Conflict;
                    state.processing = false;
                    self.publisher.publish(state.snapshot());
                    // Halt the whole queue until resolution
                    return;
                }
                Err(e) => {
                    let mut state = self.state.lock().await;
                    warn!("Push failed for {}, going offline: {}", change.path, e);
                    state.status = SyncStatus::Offline;
                    state.processing = false;
                    self.publisher.publish(state.snapshot());
                    return;
                }
            }
        }

        let mut state = self.state.lock().await;
        state.processing = false;
        if state.queue.is_empty() && state.conflicts.is_empty() {
            state.status = SyncStatus::Idle;
        }
        self.publisher.publish(state.snapshot());
    }

    /// Resolve a recorded conflict. Either choice ends with local and
    /// remote content equal and the hash cache holding the survivor's
    /// hash; once the last conflict resolves, draining resumes.
    pub async fn resolve_conflict(
        &self,
        path: &str,
        choice: ConflictChoice,
    ) -> Result<()> {
        let conflict = {
            let state = self.state.lock().await;
            state
                .conflicts
                .iter()
                .find(|c| c.path == path)
                .cloned()
                .ok_or_else(|| SyncError::ConflictNotFound(path.to_string()))?
        };

        let survivor = match choice {
            ConflictChoice::KeepLocal => {
                // Unconditional overwrite, no further hash check
                self.remote
                    .put_file(path, &conflict.local_content)
                    .await?;
                conflict.local_content.clone()
            }
            ConflictChoice::KeepRemote => conflict.remote_content.clone(),
        };

        // Update the cache before touching the local file so the
        // watcher event for the write carries the settled hash as its
        // base and does not re-conflict.
        let resume = {
            let mut state = self.state.lock().await;
            state.hashes.insert(path.to_string(), content_hash(&survivor));
            state.conflicts.retain(|c| c.path != path);
            self.persist_hashes(&state).await;
            let resolved_all = state.conflicts.is_empty();
            if resolved_all {
                state.status = SyncStatus::Idle;
            }
            self.publisher.publish(state.snapshot());
            resolved_all
        };

        self.vfs.write_file(path, &survivor).await?;
        info!("Resolved conflict for {} ({:?})", path, choice);

        if resume {
            self.process_queue().await;
        }
        Ok(())
    }

    /// Push one change, running the conflict pre-check when the change
    /// carries a base remote hash.
    async fn push_change(&self, change: &Change) -> Result<PushResult> {
        match change.op {
            ChangeOp::Create if change.is_folder => {
                self.remote.create_path(&change.path, true).await?;
                Ok(PushResult::Applied)
            }
            ChangeOp::Create | ChangeOp::Update => {
                let content = change.content.as_deref().unwrap_or_default();
                if let Some(base) = change.base_remote_hash {
                    if let Some(remote_content) = self.remote.get_file(&change.path).await? {
                        // An empty remote file cannot hold edits worth
                        // protecting; skip the check
                        if !remote_content.is_empty() && content_hash(&remote_content) != base {
                            return Ok(PushResult::Conflicted { remote_content });
                        }
                    }
                }
                self.remote.put_file(&change.path, content).await?;
                Ok(PushResult::Applied)
            }
            ChangeOp::Delete => {
                self.remote.delete_file(&change.path).await?;
                Ok(PushResult::Applied)
            }
        }
    }

    async fn handle_vfs_event(&self, event: VfsEvent) {
        match event {
            VfsEvent::Created { path, is_folder } => {
                if is_folder {
                    self.enqueue(Change::create_folder(path)).await;
                    return;
                }
                match self.vfs.read_file(&path).await {
                    Ok(content) => {
                        let base = self.cached_hash(&path).await;
                        self.enqueue(Change::create(path, Some(content)).with_base_hash(base))
                            .await;
                    }
                    Err(e) => debug!("Skipping created event for {}: {}", path, e),
                }
            }
            VfsEvent::Updated { path } => match self.vfs.read_file(&path).await {
                Ok(content) => {
                    let base = self.cached_hash(&path).await;
                    self.enqueue(Change::update(path, content).with_base_hash(base))
                        .await;
                }
                Err(e) => debug!("Skipping updated event for {}: {}", path, e),
            },
            VfsEvent::Deleted { path } => {
                self.enqueue(Change::delete(path)).await;
            }
        }
    }

    async fn cached_hash(&self, path: &str) -> Option<u32> {
        self.state.lock().await.hashes.get(path).copied()
    }

    async fn spawn_watcher_task(&self) {
        let Some(engine) = self.me.upgrade() else {
            return;
        };
        let mut events = self.vfs.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => engine.handle_vfs_event(event).await,
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Watcher lagged, {} events dropped; polling will reconcile", missed);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        self.background.lock().await.push(task);
    }

    async fn spawn_connectivity_task(&self) {
        let Some(engine) = self.me.upgrade() else {
            return;
        };
        let mut online = self.connectivity.subscribe();
        let task = tokio::spawn(async move {
            while online.changed().await.is_ok() {
                if *online.borrow() {
                    info!("Connectivity restored, resuming queue");
                    engine.process_queue().await;
                }
            }
        });
        self.background.lock().await.push(task);
    }

    async fn restart_debounce(&self) {
        let Some(engine) = self.me.upgrade() else {
            return;
        };
        let delay = self.config.debounce;
        let mut guard = self.debounce_task.lock().await;
        if let Some(task) = guard.take() {
            task.abort();
        }
        *guard = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.process_queue().await;
        }));
    }

    /// Restore queue and hash cache; corrupt state resets to empty and
    /// clears the seed marker so the next init re-seeds.
    async fn load_state(&self) {
        let mut state = self.state.lock().await;
        match self.store.get(QUEUE_KEY).await {
            Ok(Some(raw)) => match PendingQueue::from_json(&raw) {
                Ok(queue) => {
                    debug!("Restored {} queued changes", queue.len());
                    state.queue = queue;
                }
                Err(e) => {
                    warn!("Corrupt persisted queue, resetting: {}", e);
                    let _ = self.store.remove(QUEUE_KEY).await;
                    let _ = self.store.remove(SEED_KEY).await;
                }
            },
            Ok(None) => {}
            Err(e) => warn!("Failed to load persisted queue: {}", e),
        }
        match self.store.get(HASH_KEY).await {
            Ok(Some(raw)) => match serde_json::from_str::<HashMap<String, u32>>(&raw) {
                Ok(hashes) => state.hashes = hashes,
                Err(e) => {
                    warn!("Corrupt persisted hash cache, resetting: {}", e);
                    let _ = self.store.remove(HASH_KEY).await;
                    let _ = self.store.remove(SEED_KEY).await;
                }
            },
            Ok(None) => {}
            Err(e) => warn!("Failed to load persisted hash cache: {}", e),
        }
    }

    async fn persist_queue(&self, state: &EngineState) {
        match state.queue.to_json() {
            Ok(raw) => {
                if let Err(e) = self.store.put(QUEUE_KEY, &raw).await {
                    warn!("Failed to persist queue: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize queue: {}", e),
        }
    }

    async fn persist_hashes(&self, state: &EngineState) {
        match serde_json::to_string(&state.hashes) {
            Ok(raw) => {
                if let Err(e) = self.store.put(HASH_KEY, &raw).await {
                    warn!("Failed to persist hash cache: {}", e);
                }
            }
            Err(e) => warn!("Failed to serialize hash cache: {}", e),
        }
    }
}
