//! Sandsync integration tests and workspace root
//!
//! This crate serves as the root of the sandsync workspace and contains
//! integration tests that test interactions between multiple crates.

// Re-export major components for embedders and integration testing
pub use sandsync_engine as engine;
pub use sandsync_remote as remote;
pub use sandsync_vfs as vfs;
