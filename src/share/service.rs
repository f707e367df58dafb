//! Share service for Strongbox.
//!
//! Resolving a share hands out a presigned blob URL. That URL is served by
//! the blob store without the per-file key, so anyone holding it can fetch
//! the stored object until the URL expires.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::blob::BlobStore;
use crate::config::SharesConfig;
use crate::crypto::generate_token;
use crate::datetime::Timestamp;
use crate::db::Database;
use crate::file::FileRepository;
use crate::{Result, StrongboxError};

use super::repository::{NewShare, Share, ShareDetails, ShareRepository};

/// Lifetime of presigned URLs handed out by `resolve`.
pub const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(3600);

/// A successfully resolved share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareAccess {
    /// Presigned, time-limited blob URL.
    pub url: String,
    /// Filename.
    pub filename: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME type.
    pub mime_type: String,
    /// Share expiry.
    pub expires_at: Timestamp,
    /// Downloads left after this one (None for unlimited).
    pub remaining_downloads: Option<u32>,
}

/// Side-effect-free view of a live share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareInfo {
    /// Filename.
    pub filename: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME type.
    pub mime_type: String,
    /// Share expiry.
    pub expires_at: Timestamp,
    /// Downloads left (None for unlimited).
    pub remaining_downloads: Option<u32>,
}

/// A share in the owner's listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareSummary {
    /// Share ID.
    pub id: i64,
    /// Bearer token.
    pub token: String,
    /// Public link.
    pub url: String,
    /// Shared file.
    pub file_id: i64,
    /// Filename.
    pub filename: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME type.
    pub mime_type: String,
    /// Share expiry.
    pub expires_at: Timestamp,
    /// Download limit.
    pub max_downloads: Option<u32>,
    /// Downloads served so far.
    pub download_count: u32,
    /// Creation time.
    pub created_at: Timestamp,
}

/// Share service for issuing and resolving share links.
pub struct ShareService<'a> {
    db: &'a Database,
    blobs: &'a dyn BlobStore,
    config: &'a SharesConfig,
    presign_ttl: Duration,
}

impl<'a> ShareService<'a> {
    /// Create a new ShareService.
    pub fn new(db: &'a Database, blobs: &'a dyn BlobStore, config: &'a SharesConfig) -> Self {
        Self {
            db,
            blobs,
            config,
            presign_ttl: DEFAULT_PRESIGN_TTL,
        }
    }

    /// Set the lifetime of presigned URLs.
    pub fn with_presign_ttl(mut self, ttl: Duration) -> Self {
        self.presign_ttl = ttl;
        self
    }

    /// Public link for a share token.
    pub fn share_url(&self, token: &str) -> String {
        format!("{}/{}", self.config.public_base_url.trim_end_matches('/'), token)
    }

    /// Create a share link for a file the caller owns.
    pub async fn create(
        &self,
        file_id: i64,
        owner_id: i64,
        expires_in_hours: i64,
        max_downloads: Option<u32>,
    ) -> Result<Share> {
        self.create_inner(file_id, owner_id, expires_in_hours, max_downloads)
            .await
            .map_err(|e| e.logged("share create"))
    }

    async fn create_inner(
        &self,
        file_id: i64,
        owner_id: i64,
        expires_in_hours: i64,
        max_downloads: Option<u32>,
    ) -> Result<Share> {
        if expires_in_hours < 1 || expires_in_hours > self.config.max_expiry_hours {
            return Err(StrongboxError::Validation(format!(
                "expiry must be between 1 and {} hours",
                self.config.max_expiry_hours
            )));
        }
        if max_downloads == Some(0) {
            return Err(StrongboxError::Validation(
                "max downloads must be at least 1".to_string(),
            ));
        }

        let expires_at = Timestamp::now()
            .plus_hours(expires_in_hours)
            .ok_or_else(|| StrongboxError::Validation("share expiry is out of range".to_string()))?;

        let file = FileRepository::new(self.db.pool())
            .get_by_id(file_id)
            .await?
            .ok_or_else(|| StrongboxError::NotFound("file".to_string()))?;
        if file.owner_id != owner_id {
            return Err(StrongboxError::AccessDenied("file".to_string()));
        }

        let share = ShareRepository::new(self.db.pool())
            .create(&NewShare {
                token: generate_token(),
                file_id,
                expires_at,
                max_downloads,
            })
            .await?;

        info!(
            share_id = share.id,
            file_id,
            owner_id,
            expires_at = %share.expires_at,
            ?max_downloads,
            "Share created"
        );
        Ok(share)
    }

    /// Resolve a share token, counting one download.
    ///
    /// The URL is presigned before the download is counted, so a presign
    /// failure consumes nothing and no write lock is held across blob
    /// store I/O. A URL presigned for a share that loses the race for its
    /// last download is discarded.
    pub async fn resolve(&self, token: &str) -> Result<ShareAccess> {
        self.resolve_inner(token)
            .await
            .map_err(|e| e.logged("share resolve"))
    }

    async fn resolve_inner(&self, token: &str) -> Result<ShareAccess> {
        let now = Timestamp::now();
        let details = ShareRepository::new(self.db.pool())
            .get_by_token(token)
            .await?
            .ok_or_else(|| StrongboxError::NotFound("share".to_string()))?;
        details.share.check_live(now)?;

        let url = self
            .blobs
            .presigned_url(&details.object_key, self.presign_ttl)
            .await?;

        let mut conn = self.db.pool().acquire().await?;
        let Some(share) = ShareRepository::consume(&mut conn, token, now).await? else {
            let latest = ShareRepository::details_by_token(&mut conn, token)
                .await?
                .ok_or_else(|| StrongboxError::NotFound("share".to_string()))?;
            latest.share.check_live(now)?;
            return Err(StrongboxError::LimitReached);
        };

        debug!(
            share_id = share.id,
            download_count = share.download_count,
            "Share resolved"
        );
        Ok(ShareAccess {
            url,
            remaining_downloads: share.remaining_downloads(),
            expires_at: share.expires_at,
            filename: details.file_name,
            size: details.file_size,
            mime_type: details.file_mime_type,
        })
    }

    /// Look at a share without counting a download.
    pub async fn info(&self, token: &str) -> Result<ShareInfo> {
        self.info_inner(token)
            .await
            .map_err(|e| e.logged("share info"))
    }

    async fn info_inner(&self, token: &str) -> Result<ShareInfo> {
        let details = ShareRepository::new(self.db.pool())
            .get_by_token(token)
            .await?
            .ok_or_else(|| StrongboxError::NotFound("share".to_string()))?;
        details.share.check_live(Timestamp::now())?;

        Ok(ShareInfo {
            remaining_downloads: details.share.remaining_downloads(),
            expires_at: details.share.expires_at,
            filename: details.file_name,
            size: details.file_size,
            mime_type: details.file_mime_type,
        })
    }

    /// Non-expired shares over the caller's files, newest first.
    pub async fn list(&self, owner_id: i64) -> Result<Vec<ShareSummary>> {
        let shares = ShareRepository::new(self.db.pool())
            .list_active_by_owner(owner_id, Timestamp::now())
            .await
            .map_err(|e| e.logged("share list"))?;

        Ok(shares
            .into_iter()
            .map(|details| self.summarize(details))
            .collect())
    }

    /// Delete a share on one of the caller's files.
    pub async fn delete(&self, share_id: i64, owner_id: i64) -> Result<()> {
        self.delete_inner(share_id, owner_id)
            .await
            .map_err(|e| e.logged("share delete"))
    }

    async fn delete_inner(&self, share_id: i64, owner_id: i64) -> Result<()> {
        let repo = ShareRepository::new(self.db.pool());
        let details = repo
            .get_by_id(share_id)
            .await?
            .ok_or_else(|| StrongboxError::NotFound("share".to_string()))?;
        if details.owner_id != owner_id {
            return Err(StrongboxError::AccessDenied("share".to_string()));
        }

        if !repo.delete(share_id).await? {
            return Err(StrongboxError::NotFound("share".to_string()));
        }
        info!(share_id, owner_id, "Share deleted");
        Ok(())
    }

    fn summarize(&self, details: ShareDetails) -> ShareSummary {
        let share = details.share;
        ShareSummary {
            url: self.share_url(&share.token),
            id: share.id,
            token: share.token,
            file_id: share.file_id,
            filename: details.file_name,
            size: details.file_size,
            mime_type: details.file_mime_type,
            expires_at: share.expires_at,
            max_downloads: share.max_downloads,
            download_count: share.download_count,
            created_at: share.created_at,
        }
    }
}
