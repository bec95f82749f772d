//! Error types for sync operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Remote error: {0}")]
    Remote(#[from] sandsync_remote::RemoteError),

    #[error("Filesystem error: {0}")]
    Vfs(#[from] sandsync_vfs::VfsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("No conflict recorded for path: {0}")]
    ConflictNotFound(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
