//! Filesystem blob store for Strongbox.
//!
//! Objects are stored under one directory per owner:
//! ```text
//! {root}/
//! ├── 12/
//! │   ├── 345.blob        (nonce || ciphertext || tag)
//! │   └── 345.meta.toml   (content type, original name)
//! └── ...
//! ```
//!
//! Presigned URLs carry an expiry and an HMAC-SHA256 signature over
//! `{key}\n{expires}`. A valid URL yields the stored envelope without the
//! per-object key.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tokio::fs;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::{BlobMetadata, BlobStore};
use crate::crypto::{envelope, FileKey};
use crate::datetime::Timestamp;
use crate::{Result, StrongboxError};

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Serialize, Deserialize)]
struct MetadataFile {
    content_type: String,
    original_name: String,
}

/// Blob store backed by a local directory.
#[derive(Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
    base_url: Url,
    presign_secret: Vec<u8>,
}

impl LocalBlobStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    ///
    /// `base_url` is the public prefix under which presigned links are served.
    pub fn new(
        root: impl Into<PathBuf>,
        base_url: &str,
        presign_secret: impl AsRef<[u8]>,
    ) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;

        let base_url = Url::parse(base_url)
            .map_err(|e| StrongboxError::Config(format!("invalid blob base url: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StrongboxError::Config(format!(
                "blob base url cannot carry a path: {base_url}"
            )));
        }
        if presign_secret.as_ref().is_empty() {
            return Err(StrongboxError::Config(
                "presign secret must not be empty".to_string(),
            ));
        }

        Ok(Self {
            root,
            base_url,
            presign_secret: presign_secret.as_ref().to_vec(),
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the envelope file for an object key.
    ///
    /// Rejects keys with empty, dot or non `[A-Za-z0-9._-]` segments so a
    /// key can never escape the root.
    pub fn object_path(&self, key: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for segment in key.split('/') {
            let valid = !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
            if !valid {
                return Err(StrongboxError::Validation(format!(
                    "invalid object key: {key}"
                )));
            }
            path.push(segment);
        }
        path.set_extension("blob");
        Ok(path)
    }

    fn metadata_path(object_path: &Path) -> PathBuf {
        object_path.with_extension("meta.toml")
    }

    fn io_error(op: &str, key: &str, e: io::Error) -> StrongboxError {
        StrongboxError::StorageUnavailable(format!("{op} {key}: {e}"))
    }

    fn sign(&self, key: &str, expires: i64) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.presign_secret)
            .map_err(|e| StrongboxError::Config(format!("invalid presign secret: {e}")))?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Ok(mac)
    }

    /// Check a presigned URL's parameters.
    ///
    /// Fails with `Expired` once `now` reaches `expires` (Unix seconds) and
    /// with `AccessDenied` on a bad signature.
    pub fn verify_presigned(
        &self,
        key: &str,
        expires: i64,
        signature: &str,
        now: Timestamp,
    ) -> Result<()> {
        if now.millis() / 1000 >= expires {
            return Err(StrongboxError::Expired);
        }
        let provided = hex::decode(signature)
            .map_err(|_| StrongboxError::AccessDenied("malformed signature".to_string()))?;
        self.sign(key, expires)?
            .verify_slice(&provided)
            .map_err(|_| StrongboxError::AccessDenied("signature mismatch".to_string()))
    }

    /// Serve a presigned request: verify it and return the stored envelope.
    pub async fn read_presigned(&self, key: &str, expires: i64, signature: &str) -> Result<Vec<u8>> {
        self.verify_presigned(key, expires, signature, Timestamp::now())?;
        let path = self.object_path(key)?;
        fs::read(&path)
            .await
            .map_err(|e| Self::io_error("read", key, e))
    }

    /// Read the metadata stored with an object.
    pub async fn metadata(&self, key: &str) -> Result<BlobMetadata> {
        let path = Self::metadata_path(&self.object_path(key)?);
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| Self::io_error("read metadata", key, e))?;
        let meta: MetadataFile = toml::from_str(&content).map_err(|e| {
            StrongboxError::StorageUnavailable(format!("corrupt metadata for {key}: {e}"))
        })?;
        Ok(BlobMetadata::new(meta.content_type, meta.original_name))
    }

    /// Write `bytes` to `path` via a temporary file and rename.
    async fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4()));
        fs::write(&tmp, bytes).await?;
        if let Err(e) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e);
        }
        Ok(())
    }
}

impl std::fmt::Debug for LocalBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBlobStore")
            .field("root", &self.root)
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        encryption_key: &FileKey,
        metadata: &BlobMetadata,
    ) -> Result<()> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Self::io_error("create directory for", key, e))?;
        }

        let sealed = envelope::seal(encryption_key, data)?;
        let meta = toml::to_string(&MetadataFile {
            content_type: metadata.content_type.clone(),
            original_name: metadata.original_name.clone(),
        })
        .map_err(|e| StrongboxError::StorageUnavailable(format!("encode metadata: {e}")))?;

        Self::write_atomic(&Self::metadata_path(&path), meta.as_bytes())
            .await
            .map_err(|e| Self::io_error("write metadata", key, e))?;
        Self::write_atomic(&path, &sealed)
            .await
            .map_err(|e| Self::io_error("write", key, e))?;

        debug!("Stored object {} ({} bytes sealed)", key, sealed.len());
        Ok(())
    }

    async fn get(&self, key: &str, encryption_key: &FileKey) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        let sealed = fs::read(&path)
            .await
            .map_err(|e| Self::io_error("read", key, e))?;
        envelope::open(encryption_key, &sealed)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.object_path(key)?;
        for target in [path.clone(), Self::metadata_path(&path)] {
            match fs::remove_file(&target).await {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Self::io_error("delete", key, e)),
            }
        }
        debug!("Deleted object {}", key);
        Ok(())
    }

    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String> {
        self.object_path(key)?;
        let expires = Timestamp::now().millis() / 1000 + ttl.as_secs() as i64;
        let signature = hex::encode(self.sign(key, expires)?.finalize().into_bytes());

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StrongboxError::Config("blob base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(key.split('/'));
        url.query_pairs_mut()
            .append_pair("expires", &expires.to_string())
            .append_pair("signature", &signature);

        Ok(url.into())
    }
}
