//! In-memory object store.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;

use super::{expiry_timestamp, ObjectStore, StoreError};

/// `HashMap`-backed store. Keys are unrestricted; content lives on the
/// heap until deleted or swept.
///
/// The lock is a plain `std::sync::RwLock` — every critical section is a
/// map operation with no await point inside, so an async lock would buy
/// nothing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    /// True when the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey { key: key.into() });
        }
        let mut map = self
            .objects
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        map.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let map = self
            .objects
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        map.get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: key.into() })
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut map = self
            .objects
            .write()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        map.remove(key);
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<String>, StoreError> {
        let map = self
            .objects
            .read()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        // Existence check at call time — a URL for a vanished object is a
        // guaranteed 404 for whoever clicks it.
        {
            let map = self
                .objects
                .read()
                .map_err(|e| StoreError::Unavailable(e.to_string()))?;
            if !map.contains_key(key) {
                return Err(StoreError::NotFound { key: key.into() });
            }
        }
        Ok(format!("memory://{key}?expires={}", expiry_timestamp(ttl)))
    }
}
