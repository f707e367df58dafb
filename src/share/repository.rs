//! Share repository.

use sqlx::{SqliteConnection, SqlitePool};

use crate::datetime::Timestamp;
use crate::{Result, StrongboxError};

const DETAILS_QUERY: &str = "SELECT s.id, s.token, s.file_id, s.expires_at, s.max_downloads,
            s.download_count, s.created_at,
            f.owner_id, f.name AS file_name, f.size AS file_size,
            f.mime_type AS file_mime_type, f.object_key
     FROM shares s
     JOIN files f ON f.id = s.file_id";

/// A share link row.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Share {
    /// Share ID.
    pub id: i64,
    /// Bearer token.
    pub token: String,
    /// Shared file.
    pub file_id: i64,
    /// End of validity.
    #[sqlx(try_from = "i64")]
    pub expires_at: Timestamp,
    /// Download limit (None for unlimited).
    pub max_downloads: Option<u32>,
    /// Downloads served so far.
    pub download_count: u32,
    /// Creation time.
    #[sqlx(try_from = "i64")]
    pub created_at: Timestamp,
}

impl Share {
    /// Whether the share can still be resolved at `now`.
    pub fn is_live_at(&self, now: Timestamp) -> bool {
        now.is_before(&self.expires_at)
            && self
                .max_downloads
                .is_none_or(|max| self.download_count < max)
    }

    /// Downloads left (None for unlimited).
    pub fn remaining_downloads(&self) -> Option<u32> {
        self.max_downloads
            .map(|max| max.saturating_sub(self.download_count))
    }

    /// Why the share cannot be resolved at `now`, if it cannot.
    ///
    /// Expiry takes precedence over an exhausted download limit.
    pub fn check_live(&self, now: Timestamp) -> Result<()> {
        if !now.is_before(&self.expires_at) {
            return Err(StrongboxError::Expired);
        }
        if self
            .max_downloads
            .is_some_and(|max| self.download_count >= max)
        {
            return Err(StrongboxError::LimitReached);
        }
        Ok(())
    }
}

/// A share joined with its file.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ShareDetails {
    /// The share row.
    #[sqlx(flatten)]
    pub share: Share,
    /// Owner of the shared file.
    pub owner_id: i64,
    /// Filename.
    pub file_name: String,
    /// File size in bytes.
    #[sqlx(try_from = "i64")]
    pub file_size: u64,
    /// File MIME type.
    pub file_mime_type: String,
    /// Blob key of the file.
    pub object_key: String,
}

/// Data for creating a share.
#[derive(Debug, Clone)]
pub struct NewShare {
    /// Bearer token.
    pub token: String,
    /// Shared file.
    pub file_id: i64,
    /// End of validity.
    pub expires_at: Timestamp,
    /// Download limit.
    pub max_downloads: Option<u32>,
}

/// Repository for share operations.
pub struct ShareRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ShareRepository<'a> {
    /// Create a new ShareRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a share.
    pub async fn create(&self, share: &NewShare) -> Result<Share> {
        let created = sqlx::query_as::<_, Share>(
            "INSERT INTO shares (token, file_id, expires_at, max_downloads, download_count, created_at)
             VALUES (?, ?, ?, ?, 0, ?)
             RETURNING id, token, file_id, expires_at, max_downloads, download_count, created_at",
        )
        .bind(&share.token)
        .bind(share.file_id)
        .bind(share.expires_at.millis())
        .bind(share.max_downloads)
        .bind(Timestamp::now().millis())
        .fetch_one(self.pool)
        .await?;

        Ok(created)
    }

    /// Get a share with its file by token.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<ShareDetails>> {
        let mut conn = self.pool.acquire().await?;
        Self::details_by_token(&mut conn, token).await
    }

    /// Get a share with its file by share ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<ShareDetails>> {
        let details = sqlx::query_as::<_, ShareDetails>(&format!("{DETAILS_QUERY} WHERE s.id = ?"))
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(details)
    }

    /// Shares over an owner's files that have not expired at `now`,
    /// newest first.
    pub async fn list_active_by_owner(
        &self,
        owner_id: i64,
        now: Timestamp,
    ) -> Result<Vec<ShareDetails>> {
        let shares = sqlx::query_as::<_, ShareDetails>(&format!(
            "{DETAILS_QUERY}
             WHERE f.owner_id = ? AND s.expires_at > ?
             ORDER BY s.created_at DESC, s.id DESC"
        ))
        .bind(owner_id)
        .bind(now.millis())
        .fetch_all(self.pool)
        .await?;

        Ok(shares)
    }

    /// Delete a share. Returns true if it existed.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM shares WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count one download if the share is live at `now`.
    ///
    /// The liveness check and the increment are one statement, so two
    /// concurrent callers can never both take the last download. Returns
    /// the share as updated.
    pub async fn consume(
        conn: &mut SqliteConnection,
        token: &str,
        now: Timestamp,
    ) -> Result<Option<Share>> {
        let share = sqlx::query_as::<_, Share>(
            "UPDATE shares SET download_count = download_count + 1
             WHERE token = ?
               AND expires_at > ?
               AND (max_downloads IS NULL OR download_count < max_downloads)
             RETURNING id, token, file_id, expires_at, max_downloads, download_count, created_at",
        )
        .bind(token)
        .bind(now.millis())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(share)
    }

    /// Get a share with its file by token on a specific connection.
    pub async fn details_by_token(
        conn: &mut SqliteConnection,
        token: &str,
    ) -> Result<Option<ShareDetails>> {
        let details =
            sqlx::query_as::<_, ShareDetails>(&format!("{DETAILS_QUERY} WHERE s.token = ?"))
                .bind(token)
                .fetch_optional(&mut *conn)
                .await?;

        Ok(details)
    }
}
