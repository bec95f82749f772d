//! Pending-change queue with per-path coalescing
//!
//! The queue is strict FIFO for draining, but rapid successive edits to
//! one path collapse into a single entry before the debounce window
//! expires, so a burst of writes costs one network round-trip.

use std::collections::VecDeque;

use crate::change::{Change, ChangeOp};

/// Ordered queue of changes awaiting push
#[derive(Debug, Default, Clone)]
pub struct PendingQueue {
    items: VecDeque<Change>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Change at the front of the queue, the next to push
    pub fn front(&self) -> Option<&Change> {
        self.items.front()
    }

    /// Remove the front change after a successful push (or after it was
    /// downgraded into a conflict)
    pub fn pop_front(&mut self) -> Option<Change> {
        self.items.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Change> {
        self.items.iter()
    }

    /// Append a change, applying the coalescing rules first:
    /// - an incoming create/update drops any previously queued
    ///   create/update for the same path, inheriting that entry's
    ///   `base_remote_hash` (the earliest of the edit streak)
    /// - an incoming delete drops every previously queued change for
    ///   the path
    ///
    /// A queued delete is never dropped by a later create/update, so a
    /// delete-then-recreate sequence pushes in order.
    pub fn coalesce(&mut self, mut change: Change) {
        match change.op {
            ChangeOp::Create | ChangeOp::Update => {
                let superseded = self.items.iter().position(|c| {
                    c.path == change.path
                        && matches!(c.op, ChangeOp::Create | ChangeOp::Update)
                });
                if let Some(prior) = superseded.and_then(|i| self.items.remove(i)) {
                    change.base_remote_hash = prior.base_remote_hash;
                }
            }
            ChangeOp::Delete => {
                self.items.retain(|c| c.path != change.path);
            }
        }
        self.items.push_back(change);
    }

    /// Serialize for the durable store
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.items.iter().collect::<Vec<_>>())
    }

    /// Restore from the durable store
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        let items: Vec<Change> = serde_json::from_str(raw)?;
        Ok(Self {
            items: items.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_updates_coalesce_to_latest_content() {
        let mut queue = PendingQueue::new();
        queue.coalesce(Change::update("b.txt", "x".to_string()).with_base_hash(Some(7)));
        queue.coalesce(Change::update("b.txt", "y".to_string()).with_base_hash(Some(9)));

        assert_eq!(queue.len(), 1);
        let entry = queue.front().unwrap();
        assert_eq!(entry.content.as_deref(), Some("y"));
        // Earliest base hash of the streak survives
        assert_eq!(entry.base_remote_hash, Some(7));
    }

    #[test]
    fn test_update_supersedes_create() {
        let mut queue = PendingQueue::new();
        queue.coalesce(Change::create("a.txt", Some("v1".to_string())));
        queue.coalesce(Change::update("a.txt", "v2".to_string()).with_base_hash(Some(3)));

        assert_eq!(queue.len(), 1);
        let entry = queue.front().unwrap();
        assert_eq!(entry.op, ChangeOp::Update);
        assert_eq!(entry.content.as_deref(), Some("v2"));
        // The create had never been synced, so the streak's earliest
        // known remote hash is "absent"
        assert_eq!(entry.base_remote_hash, None);
    }

    #[test]
    fn test_delete_drops_everything_for_path() {
        let mut queue = PendingQueue::new();
        queue.coalesce(Change::create("c.txt", Some("v1".to_string())));
        queue.coalesce(Change::update("c.txt", "v2".to_string()));
        queue.coalesce(Change::update("other.txt", "keep".to_string()));
        queue.coalesce(Change::delete("c.txt"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.front().unwrap().path, "other.txt");
        let last = queue.iter().last().unwrap();
        assert_eq!(last.op, ChangeOp::Delete);
        assert_eq!(last.path, "c.txt");
    }

    #[test]
    fn test_delete_then_recreate_keeps_order() {
        let mut queue = PendingQueue::new();
        queue.coalesce(Change::delete("d.txt"));
        queue.coalesce(Change::create("d.txt", Some("new".to_string())));

        let ops: Vec<ChangeOp> = queue.iter().map(|c| c.op).collect();
        assert_eq!(ops, vec![ChangeOp::Delete, ChangeOp::Create]);
    }

    #[test]
    fn test_fifo_across_paths() {
        let mut queue = PendingQueue::new();
        queue.coalesce(Change::update("1.txt", "a".to_string()));
        queue.coalesce(Change::update("2.txt", "b".to_string()));
        queue.coalesce(Change::update("1.txt", "c".to_string()));

        // A coalesced entry moves to the back; per-path order is what
        // the contract guarantees, not cross-path order
        let paths: Vec<&str> = queue.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(paths, vec!["2.txt", "1.txt"]);
        let coalesced = queue.iter().last().unwrap();
        assert_eq!(coalesced.content.as_deref(), Some("c"));
    }

    #[test]
    fn test_json_roundtrip() {
        let mut queue = PendingQueue::new();
        queue.coalesce(Change::update("a.txt", "x".to_string()).with_base_hash(Some(42)));
        queue.coalesce(Change::delete("b.txt"));

        let raw = queue.to_json().unwrap();
        let restored = PendingQueue::from_json(&raw).unwrap();
        assert_eq!(restored.len(), 2);
        assert_eq!(restored.front().unwrap().base_remote_hash, Some(42));
    }
}
