//! In-memory blob store with failure injection (for testing).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use super::{BlobMetadata, BlobStore};
use crate::crypto::{envelope, FileKey};
use crate::datetime::Timestamp;
use crate::{Result, StrongboxError};

#[derive(Debug, Clone)]
struct StoredObject {
    sealed: Vec<u8>,
    metadata: BlobMetadata,
}

/// In-memory blob store.
///
/// Thread-safe via `RwLock`. Not persistent; data is lost on drop.
/// Writes and deletes can be made to fail to exercise compensation paths.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, StoredObject>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
    failing_delete_keys: RwLock<HashSet<String>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store holds no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether an object exists at `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// The sealed (encrypted) bytes at `key`, as stored.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|o| o.sealed.clone())
    }

    /// Metadata stored with the object at `key`.
    pub fn metadata(&self, key: &str) -> Option<BlobMetadata> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|o| o.metadata.clone())
    }

    /// Make every subsequent `put` fail.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `delete` fail.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make `delete` fail for one specific key.
    pub fn fail_deletes_for(&self, key: impl Into<String>) {
        self.failing_delete_keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into());
    }

    fn unavailable(op: &str, key: &str) -> StrongboxError {
        StrongboxError::StorageUnavailable(format!("blob store rejected {op} of {key}"))
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        encryption_key: &FileKey,
        metadata: &BlobMetadata,
    ) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Self::unavailable("put", key));
        }

        let sealed = envelope::seal(encryption_key, data)?;
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                key.to_string(),
                StoredObject {
                    sealed,
                    metadata: metadata.clone(),
                },
            );
        Ok(())
    }

    async fn get(&self, key: &str, encryption_key: &FileKey) -> Result<Vec<u8>> {
        let sealed = self
            .raw(key)
            .ok_or_else(|| StrongboxError::StorageUnavailable(format!("object {key} missing")))?;
        envelope::open(encryption_key, &sealed)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key_fails = self
            .failing_delete_keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key);
        if key_fails || self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Self::unavailable("delete", key));
        }

        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String> {
        if !self.contains(key) {
            return Err(StrongboxError::StorageUnavailable(format!(
                "object {key} missing"
            )));
        }
        let expires = Timestamp::now().millis() / 1000 + ttl.as_secs() as i64;
        Ok(format!("memory://{key}?expires={expires}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> FileKey {
        FileKey::from_bytes([9; 32])
    }

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryBlobStore::new();
        let meta = BlobMetadata::new("text/plain", "a.txt");

        store.put("1/1", b"hello", &key(), &meta).await.unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.metadata("1/1"), Some(meta));
        assert_ne!(store.raw("1/1").unwrap(), b"hello");
        assert_eq!(store.get("1/1", &key()).await.unwrap(), b"hello");

        store.delete("1/1").await.unwrap();
        assert!(store.is_empty());
        // Idempotent
        store.delete("1/1").await.unwrap();
    }

    #[tokio::test]
    async fn test_get_with_wrong_key() {
        let store = MemoryBlobStore::new();
        store
            .put("1/1", b"hello", &key(), &BlobMetadata::default())
            .await
            .unwrap();

        let result = store.get("1/1", &FileKey::from_bytes([1; 32])).await;
        assert!(matches!(result, Err(StrongboxError::DecryptionFailed(_))));
    }

    #[tokio::test]
    async fn test_get_missing_object() {
        let store = MemoryBlobStore::new();
        let result = store.get("1/404", &key()).await;
        assert!(matches!(result, Err(StrongboxError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = MemoryBlobStore::new();
        store.set_fail_puts(true);
        let result = store
            .put("1/1", b"x", &key(), &BlobMetadata::default())
            .await;
        assert!(matches!(result, Err(StrongboxError::StorageUnavailable(_))));
        assert!(store.is_empty());

        store.set_fail_puts(false);
        store
            .put("1/1", b"x", &key(), &BlobMetadata::default())
            .await
            .unwrap();
        store
            .put("1/2", b"y", &key(), &BlobMetadata::default())
            .await
            .unwrap();

        store.fail_deletes_for("1/1");
        assert!(store.delete("1/1").await.is_err());
        assert!(store.delete("1/2").await.is_ok());

        store.set_fail_deletes(true);
        assert!(store.delete("1/1").await.is_err());
        assert!(store.contains("1/1"));
    }

    #[tokio::test]
    async fn test_presigned_url() {
        let store = MemoryBlobStore::new();
        store
            .put("3/9", b"x", &key(), &BlobMetadata::default())
            .await
            .unwrap();

        let url = store
            .presigned_url("3/9", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("memory://3/9?expires="));

        assert!(store
            .presigned_url("3/10", Duration::from_secs(60))
            .await
            .is_err());
    }
}
