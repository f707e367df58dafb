//! Subscription tiers for Strongbox.
//!
//! Tier changes are the only writes to `users.tier`. A change is rejected
//! when the user's current usage exceeds the new tier's quota.

mod repository;
mod service;

pub use repository::{SubscriptionChange, SubscriptionRepository};
pub use service::{SubscriptionService, TierInfo, DEFAULT_HISTORY_LIMIT};

/// Format a byte count for display, e.g. `50.00 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.2} {}", size, UNITS[unit])
}
