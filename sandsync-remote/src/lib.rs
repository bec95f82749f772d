//! Remote project store client for sandsync
//!
//! This crate provides the authenticated HTTP interface to the remote
//! project store:
//! - `RemoteStore` trait: get/put/delete single file, folder creation,
//!   bulk recursive pull
//! - `HttpRemote`: reqwest-based implementation of the REST surface
//! - `TokenManager`: bearer credential cache with proactive refresh
//! - `MemoryRemote`: in-memory implementation for testing

pub mod auth;
pub mod client;
pub mod errors;
pub mod memory;

pub use auth::{BearerToken, StaticToken, TokenManager, TokenSource};
pub use client::{HttpRemote, RemoteEntry, RemoteStore};
pub use errors::{RemoteError, Result};
pub use memory::MemoryRemote;
