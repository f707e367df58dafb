//! Storage quota accounting.
//!
//! `users.storage_used` tracks the sum of committed file sizes. Increments
//! and decrements are single conditional UPDATE statements so concurrent
//! uploads for one user can never both pass the limit.

use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::db::{sql_bytes, Tier, UserRepository};
use crate::{Result, StrongboxError};

/// One mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// One gibibyte.
pub const GIB: u64 = 1024 * MIB;

/// Byte quota for a tier.
pub const fn limit_for(tier: Tier) -> u64 {
    match tier {
        Tier::Free => 50 * MIB,
        Tier::Pro => 500 * MIB,
        Tier::Premium => GIB,
    }
}

/// Current storage usage for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageReport {
    /// Current tier.
    pub tier: Tier,
    /// Bytes in use.
    pub used: u64,
    /// Tier limit in bytes.
    pub quota: u64,
    /// Bytes left before the limit.
    pub remaining: u64,
    /// Whole-number percentage of the quota in use.
    pub percentage: u8,
}

impl UsageReport {
    /// Build a report from a tier and usage.
    pub fn new(tier: Tier, used: u64) -> Self {
        let quota = limit_for(tier);
        let percentage = if quota == 0 {
            100
        } else {
            (used.saturating_mul(100) / quota).min(100) as u8
        };
        Self {
            tier,
            used,
            quota,
            remaining: quota.saturating_sub(used),
            percentage,
        }
    }
}

/// Quota checks and adjustments.
pub struct QuotaManager<'a> {
    pool: &'a SqlitePool,
}

impl<'a> QuotaManager<'a> {
    /// Create a new QuotaManager over the given pool.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Pre-flight check that `incoming` bytes fit the user's quota.
    ///
    /// Does not mutate anything; [`QuotaManager::reserve`] enforces the
    /// limit again at commit time.
    pub async fn check(&self, user_id: i64, incoming: u64) -> Result<()> {
        let user = UserRepository::new(self.pool).require(user_id).await?;
        let limit = limit_for(user.tier);

        if user.storage_used.saturating_add(incoming) > limit {
            return Err(StrongboxError::QuotaExceeded {
                used: user.storage_used,
                incoming,
                limit,
            });
        }
        Ok(())
    }

    /// Atomically add `incoming` bytes to the user's usage if the result
    /// stays within the limit of the user's tier at write time.
    pub async fn reserve(conn: &mut SqliteConnection, user_id: i64, incoming: u64) -> Result<()> {
        let delta = sql_bytes(incoming)?;
        let result = sqlx::query(
            "UPDATE users SET storage_used = storage_used + ?
             WHERE id = ?
               AND storage_used + ? <= CASE tier
                   WHEN 'FREE' THEN ?
                   WHEN 'PRO' THEN ?
                   WHEN 'PREMIUM' THEN ?
                   ELSE 0
               END",
        )
        .bind(delta)
        .bind(user_id)
        .bind(delta)
        .bind(sql_bytes(limit_for(Tier::Free))?)
        .bind(sql_bytes(limit_for(Tier::Pro))?)
        .bind(sql_bytes(limit_for(Tier::Premium))?)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 1 {
            debug!("Reserved {} bytes for user {}", incoming, user_id);
            return Ok(());
        }

        let row: Option<(String, i64)> =
            sqlx::query_as("SELECT tier, storage_used FROM users WHERE id = ?")
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?;

        match row {
            None => Err(StrongboxError::NotFound("user".to_string())),
            Some((tier, used)) => {
                let tier: Tier = tier.parse().map_err(StrongboxError::StorageUnavailable)?;
                Err(StrongboxError::QuotaExceeded {
                    used: used.max(0) as u64,
                    incoming,
                    limit: limit_for(tier),
                })
            }
        }
    }

    /// Subtract `bytes` from the user's usage, never going below zero.
    ///
    /// An underflow means the counter had drifted from the committed files;
    /// the value is clamped to zero and the drift is logged.
    pub async fn release(conn: &mut SqliteConnection, user_id: i64, bytes: u64) -> Result<()> {
        if bytes == 0 {
            return Ok(());
        }

        let delta = sql_bytes(bytes)?;
        let result = sqlx::query(
            "UPDATE users SET storage_used = storage_used - ? WHERE id = ? AND storage_used >= ?",
        )
        .bind(delta)
        .bind(user_id)
        .bind(delta)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 1 {
            debug!("Released {} bytes for user {}", bytes, user_id);
            return Ok(());
        }

        let clamped: Option<i64> =
            sqlx::query_scalar("UPDATE users SET storage_used = 0 WHERE id = ? RETURNING id")
                .bind(user_id)
                .fetch_optional(&mut *conn)
                .await?;

        match clamped {
            Some(_) => {
                warn!(
                    user_id,
                    released = bytes,
                    "Storage usage would go negative; clamped to 0"
                );
                Ok(())
            }
            None => Err(StrongboxError::NotFound("user".to_string())),
        }
    }

    /// Current usage report for a user.
    pub async fn usage(&self, user_id: i64) -> Result<UsageReport> {
        let user = UserRepository::new(self.pool).require(user_id).await?;
        Ok(UsageReport::new(user.tier, user.storage_used))
    }
}
