//! Error types for virtual filesystem operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VfsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Watcher error: {0}")]
    Watcher(String),
}

pub type Result<T> = std::result::Result<T, VfsError>;
