//! Encrypted object storage for Strongbox.
//!
//! Blob stores apply a caller-supplied key on every read and write
//! (SSE-C style): the store never derives or keeps keys itself.
//!
//! Object keys are owner-scoped:
//! ```text
//! {owner_id}/{file_id}
//! ```

mod local;
mod memory;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

use std::time::Duration;

use async_trait::async_trait;

use crate::crypto::FileKey;
use crate::Result;

/// Descriptive metadata stored alongside an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobMetadata {
    /// MIME type of the plaintext.
    pub content_type: String,
    /// Original filename at upload time.
    pub original_name: String,
}

impl BlobMetadata {
    /// Create metadata for an upload.
    pub fn new(content_type: impl Into<String>, original_name: impl Into<String>) -> Self {
        Self {
            content_type: content_type.into(),
            original_name: original_name.into(),
        }
    }
}

/// Object store holding encrypted file payloads.
///
/// I/O failures surface as `StorageUnavailable`; a read with the wrong key
/// surfaces as `DecryptionFailed`.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Encrypt `data` under `encryption_key` and store it at `key`.
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        encryption_key: &FileKey,
        metadata: &BlobMetadata,
    ) -> Result<()>;

    /// Fetch and decrypt the object at `key`.
    async fn get(&self, key: &str, encryption_key: &FileKey) -> Result<Vec<u8>>;

    /// Delete the object at `key`.
    ///
    /// Returns `Ok(())` even if the object didn't exist (idempotent).
    async fn delete(&self, key: &str) -> Result<()>;

    /// Issue a time-limited, unauthenticated fetch URL for `key`.
    ///
    /// The URL is not gated by the per-object key: whoever holds it can
    /// fetch the stored object until it expires.
    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String>;
}

/// Build the object key for a file.
pub fn object_key(owner_id: i64, file_id: i64) -> String {
    format!("{owner_id}/{file_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_format() {
        assert_eq!(object_key(12, 345), "12/345");
    }

    #[test]
    fn test_blob_metadata_new() {
        let meta = BlobMetadata::new("text/plain", "notes.txt");
        assert_eq!(meta.content_type, "text/plain");
        assert_eq!(meta.original_name, "notes.txt");
    }
}
