//! Error types for remote store operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Server returned {status} for {path}")]
    Http { status: u16, path: String },

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Remote unreachable: {0}")]
    Unreachable(String),
}

pub type Result<T> = std::result::Result<T, RemoteError>;
