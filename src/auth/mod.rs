//! Authentication collaborator for Strongbox.
//!
//! Services receive an already-authenticated user ID. This module maps
//! opaque bearer tokens to users and holds the short-lived challenges of
//! multi-step login ceremonies.

mod challenge;
mod session;

pub use challenge::{ChallengeCache, DEFAULT_CHALLENGE_TTL};
pub use session::{SessionAuthenticator, DEFAULT_SESSION_EXPIRY_HOURS};

use async_trait::async_trait;

use crate::db::User;
use crate::Result;

/// Resolves a bearer token to the user it authenticates.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// The user for `token`, or None if the token is unknown or expired.
    async fn authenticate(&self, token: &str) -> Result<Option<User>>;
}
