//! User model for Strongbox.
//!
//! This module defines the User struct and the storage Tier enum.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::datetime::Timestamp;

/// Storage plan a user is subscribed to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tier {
    /// 50 MiB.
    #[default]
    Free,
    /// 500 MiB.
    Pro,
    /// 1 GiB.
    Premium,
}

impl Tier {
    /// All tiers, smallest first.
    pub const ALL: [Tier; 3] = [Tier::Free, Tier::Pro, Tier::Premium];

    /// Convert tier to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Free => "FREE",
            Tier::Pro => "PRO",
            Tier::Premium => "PREMIUM",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FREE" => Ok(Tier::Free),
            "PRO" => Ok(Tier::Pro),
            "PREMIUM" => Ok(Tier::Premium),
            _ => Err(format!("unknown tier: {s}")),
        }
    }
}

impl TryFrom<String> for Tier {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A storage account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login name (unique).
    pub username: String,
    /// Email address (unique).
    pub email: String,
    /// Current storage plan.
    #[sqlx(try_from = "String")]
    pub tier: Tier,
    /// Bytes of committed files currently owned.
    #[sqlx(try_from = "i64")]
    pub storage_used: u64,
    /// Account creation time.
    #[sqlx(try_from = "i64")]
    pub created_at: Timestamp,
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Initial tier (defaults to Free).
    pub tier: Tier,
}

impl NewUser {
    /// Create a new user on the Free tier.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            tier: Tier::Free,
        }
    }

    /// Set the initial tier.
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }
}
