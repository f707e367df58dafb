//! Session token repository.

use super::DbPool;
use crate::datetime::Timestamp;
use crate::{Result, StrongboxError};

/// Session entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    /// Session ID.
    pub id: i64,
    /// Bearer token.
    pub token: String,
    /// User the session authenticates.
    pub user_id: i64,
    /// Expiration time.
    #[sqlx(try_from = "i64")]
    pub expires_at: Timestamp,
    /// Creation time.
    #[sqlx(try_from = "i64")]
    pub created_at: Timestamp,
}

impl Session {
    /// Whether the session is expired at `now`.
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

/// New session for creation.
pub struct NewSession {
    /// User ID.
    pub user_id: i64,
    /// Bearer token.
    pub token: String,
    /// Expiration time.
    pub expires_at: Timestamp,
}

/// Repository for session operations.
pub struct SessionRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Create a new session.
    pub async fn create(&self, new_session: &NewSession) -> Result<Session> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO sessions (token, user_id, expires_at, created_at)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(&new_session.token)
        .bind(new_session.user_id)
        .bind(new_session.expires_at.millis())
        .bind(Timestamp::now().millis())
        .fetch_one(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| StrongboxError::NotFound("session".into()))
    }

    /// Get a session by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, token, user_id, expires_at, created_at FROM sessions WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(session)
    }

    /// Get a session by token string.
    pub async fn get_by_token(&self, token: &str) -> Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, token, user_id, expires_at, created_at FROM sessions WHERE token = ?",
        )
        .bind(token)
        .fetch_optional(self.pool)
        .await?;

        Ok(session)
    }

    /// Delete a session by token. Returns true if a session was removed.
    pub async fn delete_by_token(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete all sessions for a user.
    pub async fn delete_for_user(&self, user_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Delete sessions that expired at or before `now`.
    pub async fn purge_expired(&self, now: Timestamp) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now.millis())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
