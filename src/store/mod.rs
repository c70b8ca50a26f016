//! Object store abstraction: named byte blobs with presigned retrieval.
//!
//! Every other component stages its artifacts through [`ObjectStore`] —
//! source documents, page images, fragments, and the final converted
//! document all live under flat string keys. The trait is deliberately
//! small and stateless: no retries, no caching, no transactions. Retries
//! (if any) belong to the caller; the periodic sweep is the backstop for
//! anything a crashed job leaves behind.
//!
//! Two backends ship with the crate:
//!
//! * [`MemoryStore`] — `HashMap` behind a lock; the default for tests and
//!   embedded use.
//! * [`FsStore`] — one file per key inside a root directory; the default
//!   for the CLI.
//!
//! An S3-class backend is a third implementation of the same trait and
//! needs nothing from the rest of the crate.

mod fs;
mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use thiserror::Error;

/// Errors produced by [`ObjectStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store backend could not be reached or refused the operation.
    #[error("object store unavailable: {0}")]
    Unavailable(String),

    /// No object exists at the requested key.
    #[error("no object at key '{key}'")]
    NotFound { key: String },

    /// The key cannot be mapped onto this backend (path traversal,
    /// separator characters, empty string).
    #[error("invalid store key '{key}'")]
    InvalidKey { key: String },
}

/// Uploads, downloads, deletes, lists, and presigns named byte blobs.
///
/// All operations are independent and stateless. `put` overwrites any
/// existing object; `delete` is idempotent (deleting a missing key is not
/// an error); `presigned_url` must check existence at call time rather
/// than serving a cached answer.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, overwriting any existing object.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Fetch the object at `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Delete the object at `key`. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List every key currently in the store.
    async fn list_all(&self) -> Result<Vec<String>, StoreError>;

    /// Produce a time-limited retrieval URL for `key`, expiring after
    /// `ttl`. Fails with [`StoreError::NotFound`] if the key is absent at
    /// call time.
    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, StoreError>;
}

/// Unix timestamp at which a URL signed now with `ttl` expires.
///
/// Shared by the shipped backends so their `expires` query parameters are
/// directly comparable.
pub(crate) fn expiry_timestamp(ttl: Duration) -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .saturating_add(ttl)
        .as_secs()
}
