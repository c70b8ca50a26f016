//! Filesystem-backed object store: one file per key under a root directory.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{expiry_timestamp, ObjectStore, StoreError};

/// Stores each object as `<root>/<key>`.
///
/// Keys must be plain file names — separators and `..` are rejected so a
/// key can never escape the root. Writes go through a `.tmp` sibling and a
/// rename, so a crashed `put` never leaves a half-written object visible
/// under its final key.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::Unavailable(format!("create {}: {e}", root.display())))?;
        Ok(Self { root })
    }

    /// The directory this store writes into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty()
            || key.contains('/')
            || key.contains('\\')
            || key == "."
            || key == ".."
            || key.ends_with(".tmp")
        {
            return Err(StoreError::InvalidKey { key: key.into() });
        }
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl ObjectStore for FsStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        // Appended, not substituted: `a.png` and `a.pdf` must not share a
        // temp sibling.
        let tmp = self.root.join(format!("{key}.tmp"));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| StoreError::Unavailable(format!("write {key}: {e}")))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("rename {key}: {e}")))?;
        debug!("stored {} ({} bytes)", key, bytes.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound { key: key.into() })
            }
            Err(e) => Err(StoreError::Unavailable(format!("read {key}: {e}"))),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Unavailable(format!("delete {key}: {e}"))),
        }
    }

    async fn list_all(&self) -> Result<Vec<String>, StoreError> {
        let mut dir = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| StoreError::Unavailable(format!("list: {e}")))?;
        let mut keys = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::Unavailable(format!("list: {e}")))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            // Skip in-flight temp files from concurrent puts.
            if name.ends_with(".tmp") {
                continue;
            }
            keys.push(name);
        }
        keys.sort();
        Ok(keys)
    }

    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        let path = self.path_for(key)?;
        if !tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::Unavailable(format!("stat {key}: {e}")))?
        {
            return Err(StoreError::NotFound { key: key.into() });
        }
        Ok(format!(
            "file://{}?expires={}",
            path.display(),
            expiry_timestamp(ttl)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, FsStore) {
        let dir = TempDir::new().unwrap();
        let store = FsStore::open(dir.path()).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn roundtrip_and_list() {
        let (_dir, store) = open_temp().await;
        store.put("a.pdf", vec![1, 2]).await.unwrap();
        store.put("b.png", vec![3]).await.unwrap();
        assert_eq!(store.get("a.pdf").await.unwrap(), vec![1, 2]);
        assert_eq!(store.list_all().await.unwrap(), vec!["a.pdf", "b.png"]);
    }

    #[tokio::test]
    async fn delete_missing_succeeds() {
        let (_dir, store) = open_temp().await;
        store.delete("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn traversal_keys_rejected() {
        let (_dir, store) = open_temp().await;
        for key in ["../escape", "a/b", "", ".."] {
            assert!(
                matches!(
                    store.put(key, vec![]).await,
                    Err(StoreError::InvalidKey { .. })
                ),
                "key {key:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn presign_checks_existence() {
        let (_dir, store) = open_temp().await;
        assert!(matches!(
            store.presigned_url("ghost", Duration::from_secs(60)).await,
            Err(StoreError::NotFound { .. })
        ));
        store.put("real", vec![0]).await.unwrap();
        let url = store
            .presigned_url("real", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("file://"), "got {url}");
        assert!(url.contains("expires="));
    }
}
