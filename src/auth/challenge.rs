//! Pending authentication challenges.
//!
//! Multi-step ceremonies (registration, login) store a challenge between
//! the options request and the verification request. The cache is an
//! explicit value owned by the caller, keyed by email.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::debug;

/// Default challenge lifetime (5 minutes).
pub const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug)]
struct PendingChallenge {
    challenge: String,
    issued_at: Instant,
}

/// In-memory challenge store with TTL eviction.
///
/// # Example
///
/// ```
/// use strongbox::auth::ChallengeCache;
/// use std::time::Duration;
///
/// let cache = ChallengeCache::new(Duration::from_secs(300));
/// cache.insert("alice@example.com", "c-123");
///
/// assert_eq!(cache.take("alice@example.com").as_deref(), Some("c-123"));
/// // Single use
/// assert_eq!(cache.take("alice@example.com"), None);
/// ```
#[derive(Debug)]
pub struct ChallengeCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, PendingChallenge>>,
}

impl ChallengeCache {
    /// Create an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Store a challenge for `email`, replacing any previous one.
    pub fn insert(&self, email: impl Into<String>, challenge: impl Into<String>) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                email.into().to_lowercase(),
                PendingChallenge {
                    challenge: challenge.into(),
                    issued_at: Instant::now(),
                },
            );
    }

    /// Remove and return the challenge for `email` if it has not expired.
    pub fn take(&self, email: &str) -> Option<String> {
        let entry = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&email.to_lowercase())?;

        if entry.issued_at.elapsed() >= self.ttl {
            debug!("Challenge expired before use");
            return None;
        }
        Some(entry.challenge)
    }

    /// Drop every expired challenge. Returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|_, entry| entry.issued_at.elapsed() < self.ttl);
        before - entries.len()
    }

    /// Number of stored challenges, expired or not.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ChallengeCache {
    fn default() -> Self {
        Self::new(DEFAULT_CHALLENGE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_is_single_use() {
        let cache = ChallengeCache::default();
        cache.insert("alice@example.com", "abc");

        assert_eq!(cache.take("alice@example.com").as_deref(), Some("abc"));
        assert_eq!(cache.take("alice@example.com"), None);
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let cache = ChallengeCache::default();
        cache.insert("Alice@Example.com", "abc");
        assert_eq!(cache.take("alice@example.com").as_deref(), Some("abc"));
    }

    #[test]
    fn test_insert_replaces() {
        let cache = ChallengeCache::default();
        cache.insert("a@x", "first");
        cache.insert("a@x", "second");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.take("a@x").as_deref(), Some("second"));
    }

    #[test]
    fn test_expired_challenges() {
        let cache = ChallengeCache::new(Duration::ZERO);
        cache.insert("a@x", "one");
        cache.insert("b@x", "two");

        assert_eq!(cache.take("a@x"), None);
        assert_eq!(cache.evict_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evict_keeps_live_entries() {
        let cache = ChallengeCache::new(Duration::from_secs(60));
        cache.insert("a@x", "one");
        assert_eq!(cache.evict_expired(), 0);
        assert_eq!(cache.len(), 1);
    }
}
