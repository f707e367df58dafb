//! Database-backed session tokens.

use async_trait::async_trait;
use tracing::{debug, info};

use super::Authenticator;
use crate::crypto::generate_token;
use crate::datetime::Timestamp;
use crate::db::{Database, NewSession, Session, SessionRepository, User, UserRepository};
use crate::{Result, StrongboxError};

/// Default session lifetime (one week).
pub const DEFAULT_SESSION_EXPIRY_HOURS: i64 = 168;

/// Issues and validates session tokens stored in the `sessions` table.
#[derive(Debug, Clone)]
pub struct SessionAuthenticator {
    db: Database,
    expiry_hours: i64,
}

impl SessionAuthenticator {
    /// Create an authenticator with the default lifetime.
    pub fn new(db: Database) -> Self {
        Self {
            db,
            expiry_hours: DEFAULT_SESSION_EXPIRY_HOURS,
        }
    }

    /// Set the session lifetime in hours.
    pub fn with_expiry_hours(mut self, hours: i64) -> Self {
        self.expiry_hours = hours;
        self
    }

    /// Issue a new session for a user.
    pub async fn issue(&self, user_id: i64) -> Result<Session> {
        if self.expiry_hours < 1 {
            return Err(StrongboxError::Config(
                "session expiry must be at least 1 hour".to_string(),
            ));
        }
        let expires_at = Timestamp::now()
            .plus_hours(self.expiry_hours)
            .ok_or_else(|| StrongboxError::Config("session expiry is out of range".to_string()))?;
        UserRepository::new(self.db.pool()).require(user_id).await?;

        let session = SessionRepository::new(self.db.pool())
            .create(&NewSession {
                user_id,
                token: generate_token(),
                expires_at,
            })
            .await?;

        info!(user_id, expires_at = %session.expires_at, "Session issued");
        Ok(session)
    }

    /// Revoke a session. Returns true if it existed.
    pub async fn revoke(&self, token: &str) -> Result<bool> {
        let revoked = SessionRepository::new(self.db.pool())
            .delete_by_token(token)
            .await?;
        if revoked {
            debug!("Session revoked");
        }
        Ok(revoked)
    }

    /// Delete all expired sessions. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let purged = SessionRepository::new(self.db.pool())
            .purge_expired(Timestamp::now())
            .await?;
        if purged > 0 {
            info!(purged, "Expired sessions purged");
        }
        Ok(purged)
    }
}

#[async_trait]
impl Authenticator for SessionAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<Option<User>> {
        let sessions = SessionRepository::new(self.db.pool());
        let Some(session) = sessions.get_by_token(token).await? else {
            return Ok(None);
        };

        if session.is_expired_at(Timestamp::now()) {
            sessions.delete_by_token(token).await?;
            debug!(user_id = session.user_id, "Expired session removed");
            return Ok(None);
        }

        UserRepository::new(self.db.pool())
            .get_by_id(session.user_id)
            .await
    }
}
