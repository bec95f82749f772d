//! Conflict records and resolution choices
//!
//! A conflict is not an error: both versions are retained verbatim
//! until a human picks one. Resolution always ends with local and
//! remote content equal for the path.

use serde::{Deserialize, Serialize};

/// An unresolved divergence between local and remote content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub path: String,
    pub local_content: String,
    pub remote_content: String,
}

/// User decision for a conflicted path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    /// Push local content to the remote, overwriting unconditionally
    KeepLocal,
    /// Overwrite the local file with remote content
    KeepRemote,
}
