//! Sandboxed virtual filesystem for sandsync
//!
//! This crate wraps a sandbox root directory and provides:
//! - Explicit read/write/create/delete/rename operations that emit
//!   change events synchronously to all subscribers
//! - A periodic polling watcher that detects presence/absence changes
//!   made by other actors (package installers, build tools)
//! - An optional notify-based native watcher for environments with
//!   real OS file-change notification

pub mod errors;
pub mod filter;
pub mod native;
pub mod sandbox;

pub use errors::{Result, VfsError};
pub use filter::is_ignored_path;
pub use native::NativeWatcher;
pub use sandbox::{SandboxFs, VfsConfig, VfsEntry, VfsEvent};
