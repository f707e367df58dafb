//! Subscription service for Strongbox.

use serde::Serialize;
use tracing::info;

use crate::db::{sql_bytes, Database, Tier};
use crate::quota::{limit_for, QuotaManager, UsageReport};
use crate::{Result, StrongboxError};

use super::format_bytes;
use super::repository::{SubscriptionChange, SubscriptionRepository};

/// Number of history entries returned when the caller has no preference.
pub const DEFAULT_HISTORY_LIMIT: i64 = 10;

/// A tier in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TierInfo {
    /// Tier.
    pub tier: Tier,
    /// Quota in bytes.
    pub quota: u64,
    /// Human-readable quota.
    pub quota_formatted: String,
    /// Monthly price in cents.
    pub price_cents: u32,
    /// Marketing feature list.
    pub features: Vec<&'static str>,
}

impl TierInfo {
    fn new(tier: Tier) -> Self {
        let (price_cents, features) = match tier {
            Tier::Free => (
                0,
                vec![
                    "50 MB storage",
                    "Basic file management",
                    "Secure encryption",
                    "WebAuthn login",
                ],
            ),
            Tier::Pro => (
                499,
                vec![
                    "500 MB storage",
                    "Advanced file management",
                    "Secure encryption",
                    "WebAuthn login",
                    "Priority support",
                ],
            ),
            Tier::Premium => (
                999,
                vec![
                    "1 GB storage",
                    "Advanced file management",
                    "Secure encryption",
                    "WebAuthn login",
                    "Priority support",
                    "Extended file retention",
                ],
            ),
        };

        Self {
            tier,
            quota: limit_for(tier),
            quota_formatted: format_bytes(limit_for(tier)),
            price_cents,
            features,
        }
    }
}

/// Subscription service for tier changes and usage reports.
pub struct SubscriptionService<'a> {
    db: &'a Database,
}

impl<'a> SubscriptionService<'a> {
    /// Create a new SubscriptionService.
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// The tier catalogue, smallest first.
    pub fn tiers(&self) -> Vec<TierInfo> {
        Self::catalogue()
    }

    fn catalogue() -> Vec<TierInfo> {
        Tier::ALL.into_iter().map(TierInfo::new).collect()
    }

    /// Current usage for a user.
    pub async fn usage(&self, user_id: i64) -> Result<UsageReport> {
        QuotaManager::new(self.db.pool())
            .usage(user_id)
            .await
            .map_err(|e| e.logged("usage report"))
    }

    /// Move a user to `new_tier`.
    ///
    /// Rejected with `InvalidTierTransition` when current usage exceeds the
    /// new tier's quota; usage equal to the quota is allowed. The tier
    /// update and the history row commit together.
    pub async fn change_tier(&self, user_id: i64, new_tier: Tier) -> Result<UsageReport> {
        self.change_tier_inner(user_id, new_tier)
            .await
            .map_err(|e| e.logged("tier change"))
    }

    async fn change_tier_inner(&self, user_id: i64, new_tier: Tier) -> Result<UsageReport> {
        let new_limit = limit_for(new_tier);
        let mut tx = self.db.begin().await?;

        // Take the write lock first so the read below cannot go stale
        let current: Option<(String, i64)> = sqlx::query_as(
            "UPDATE users SET tier = tier WHERE id = ? RETURNING tier, storage_used",
        )
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;
        let (current_tier, used) =
            current.ok_or_else(|| StrongboxError::NotFound("user".to_string()))?;
        let current_tier: Tier = current_tier
            .parse()
            .map_err(StrongboxError::StorageUnavailable)?;
        let used = used.max(0) as u64;

        if current_tier == new_tier {
            return Ok(UsageReport::new(new_tier, used));
        }

        let result = sqlx::query("UPDATE users SET tier = ? WHERE id = ? AND storage_used <= ?")
            .bind(new_tier.as_str())
            .bind(user_id)
            .bind(sql_bytes(new_limit)?)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StrongboxError::InvalidTierTransition {
                used,
                limit: new_limit,
            });
        }

        SubscriptionRepository::record(&mut tx, user_id, current_tier, new_tier).await?;
        tx.commit().await?;

        info!(
            user_id,
            from = %current_tier,
            to = %new_tier,
            used,
            "Subscription tier changed"
        );
        Ok(UsageReport::new(new_tier, used))
    }

    /// Recent tier changes for a user, newest first.
    pub async fn history(&self, user_id: i64, limit: i64) -> Result<Vec<SubscriptionChange>> {
        SubscriptionRepository::new(self.db.pool())
            .history(user_id, limit.clamp(1, 100))
            .await
            .map_err(|e| e.logged("subscription history"))
    }
}
