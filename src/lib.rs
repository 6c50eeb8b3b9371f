//! kvadmin is a small administrative layer over an embedded key-value store.
//!
//! Keys are hierarchical [`KeyPath`]s, values are either structured JSON or
//! opaque bytes. Everything durable (ordering, atomic commits, isolation) is
//! delegated to a [`KvEngine`]; this crate only adds prefix listing, bulk
//! dump/restore through a JSON archive and a read-only file server.
//!
//! ## Core Components
//! - [`engine`]: engine implementations and the [`engine::StoreHandle`] that owns one.
//! - [`admin`]: the [`admin::AdminService`] operation surface.
//! - [`archive`]: JSON archive codec used by dump and restore.
//! - [`server`]: HTTP adapter serving binary records as files.

pub mod admin;
pub mod archive;
pub mod config;
pub mod engine;
pub mod key;
pub mod record;
pub mod server;

pub use admin::AdminService;
pub use config::AdminConfig;
pub use engine::{Locator, StoreHandle};
pub use key::KeyPath;
pub use record::{Record, Snapshot, Value};

use async_trait::async_trait;
use thiserror::Error;

/// Errors returned by kvadmin.
#[derive(Error, Debug)]
pub enum Error {
    /// The engine could not open the store.
    #[error("failed to open store: {0}")]
    Initialization(String),
    /// An operation was attempted on a handle that was never opened.
    #[error("store handle is not initialized")]
    NotInitialized,
    /// The engine failed to commit a write.
    #[error("write failed: {0}")]
    Write(String),
    /// The engine failed while reading.
    #[error("storage error: {0}")]
    Storage(String),
    /// A dump/restore document is malformed.
    #[error("invalid archive: {0}")]
    ArchiveFormat(String),
    /// A key is not a valid [`KeyPath`] for the requested operation.
    #[error("invalid key: {0}")]
    InvalidKey(String),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
    /// An I/O error occurred while reading or writing a file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized Result type for kvadmin operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A byte-oriented ordered key-value engine.
///
/// Keys are compared bytewise. Implementations must give every single-key
/// write and every batch call the atomicity of one commit.
#[async_trait]
pub trait KvEngine: Send + Sync {
    /// Returns the value stored at `key`, or `None` when absent.
    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Stores `value` at `key`, replacing any previous value.
    ///
    /// Returns `Ok(false)` when the engine refuses the write for capacity
    /// reasons; fatal failures are returned as [`Error::Write`].
    async fn set(&self, key: &[u8], value: &[u8]) -> Result<bool>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &[u8]) -> Result<()>;

    /// Returns every entry whose key starts with `prefix`, in key order,
    /// read from one consistent view of the store.
    async fn scan(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Stores all `entries` in one commit. Same return contract as [`KvEngine::set`].
    async fn batch_set(&self, entries: Vec<(Vec<u8>, Vec<u8>)>) -> Result<bool>;

    /// Removes every key starting with `prefix` in one commit and returns how many were removed.
    async fn clear_prefix(&self, prefix: &[u8]) -> Result<usize>;
}
