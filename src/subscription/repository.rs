//! Subscription history repository.

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::datetime::Timestamp;
use crate::db::Tier;
use crate::Result;

/// One tier transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct SubscriptionChange {
    /// Row ID.
    pub id: i64,
    /// User whose tier changed.
    pub user_id: i64,
    /// Previous tier.
    #[sqlx(try_from = "String")]
    pub from_tier: Tier,
    /// New tier.
    #[sqlx(try_from = "String")]
    pub to_tier: Tier,
    /// When the change happened.
    #[sqlx(try_from = "i64")]
    pub changed_at: Timestamp,
}

/// Repository for the append-only subscription history.
pub struct SubscriptionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SubscriptionRepository<'a> {
    /// Create a new SubscriptionRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recent changes for a user, newest first.
    pub async fn history(&self, user_id: i64, limit: i64) -> Result<Vec<SubscriptionChange>> {
        let changes = sqlx::query_as::<_, SubscriptionChange>(
            "SELECT id, user_id, from_tier, to_tier, changed_at
             FROM subscription_history
             WHERE user_id = ?
             ORDER BY changed_at DESC, id DESC
             LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(changes)
    }

    /// Append a transition.
    pub async fn record(
        conn: &mut SqliteConnection,
        user_id: i64,
        from_tier: Tier,
        to_tier: Tier,
    ) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO subscription_history (user_id, from_tier, to_tier, changed_at)
             VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(user_id)
        .bind(from_tier.as_str())
        .bind(to_tier.as_str())
        .bind(Timestamp::now().millis())
        .fetch_one(&mut *conn)
        .await?;

        Ok(id)
    }
}
