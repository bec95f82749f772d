//! Pending change records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of mutation intended for the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
}

/// One mutation queued for push to the remote store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub op: ChangeOp,
    pub path: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub content: Option<String>,
    pub timestamp: DateTime<Utc>,
    /// Hash of remote content as last known at enqueue time, absent if
    /// the path was never synced. Drives the optimistic-concurrency
    /// check before a push.
    #[serde(default)]
    pub base_remote_hash: Option<u32>,
}

impl Change {
    pub fn create(path: impl Into<String>, content: Option<String>) -> Self {
        Self {
            op: ChangeOp::Create,
            path: path.into(),
            is_folder: false,
            content,
            timestamp: Utc::now(),
            base_remote_hash: None,
        }
    }

    pub fn create_folder(path: impl Into<String>) -> Self {
        Self {
            op: ChangeOp::Create,
            path: path.into(),
            is_folder: true,
            content: None,
            timestamp: Utc::now(),
            base_remote_hash: None,
        }
    }

    pub fn update(path: impl Into<String>, content: String) -> Self {
        Self {
            op: ChangeOp::Update,
            path: path.into(),
            is_folder: false,
            content: Some(content),
            timestamp: Utc::now(),
            base_remote_hash: None,
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            op: ChangeOp::Delete,
            path: path.into(),
            is_folder: false,
            content: None,
            timestamp: Utc::now(),
            base_remote_hash: None,
        }
    }

    pub fn with_base_hash(mut self, base: Option<u32>) -> Self {
        self.base_remote_hash = base;
        self
    }
}
