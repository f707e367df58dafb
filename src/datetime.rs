//! Date/time utilities for Strongbox.
//!
//! Timestamps are persisted as Unix milliseconds so that SQL comparisons
//! such as `expires_at > ?` are exact integer comparisons.

use std::fmt;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::Serialize;

/// A UTC instant stored as integer milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// The current instant, truncated to whole milliseconds.
    pub fn now() -> Self {
        Self(Utc::now().trunc_subsecs(3))
    }

    /// Milliseconds since the Unix epoch.
    pub fn millis(&self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Build from milliseconds since the Unix epoch.
    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    /// The wrapped chrono value.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// This instant shifted by the given number of hours.
    ///
    /// Returns None when the result is outside the representable range.
    pub fn plus_hours(&self, hours: i64) -> Option<Self> {
        Duration::try_hours(hours)
            .and_then(|delta| self.0.checked_add_signed(delta))
            .map(Self)
    }

    /// Whether this instant is strictly before `other`.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Format with a chrono format string (e.g. "%Y/%m/%d %H:%M").
    pub fn format(&self, format: &str) -> String {
        self.0.format(format).to_string()
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl TryFrom<i64> for Timestamp {
    type Error = String;

    fn try_from(millis: i64) -> Result<Self, Self::Error> {
        Self::from_millis(millis).ok_or_else(|| format!("timestamp out of range: {millis}"))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_millis_roundtrip_preserves_instant() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let ts = Timestamp::from(dt);
        assert_eq!(Timestamp::from_millis(ts.millis()), Some(ts));
    }

    #[test]
    fn test_try_from_out_of_range() {
        assert!(Timestamp::try_from(i64::MAX).is_err());
    }

    #[test]
    fn test_plus_hours_and_ordering() {
        let now = Timestamp::now();
        let later = now.plus_hours(2).unwrap();
        assert!(now.is_before(&later));
        assert_eq!(later.millis() - now.millis(), 2 * 60 * 60 * 1000);
    }

    #[test]
    fn test_plus_hours_overflow() {
        let now = Timestamp::now();
        assert!(now.plus_hours(i64::MAX).is_none());
        assert!(now.plus_hours(10_000_000_000).is_none());
        assert!(now.plus_hours(-10_000_000_000).is_none());
    }

    #[test]
    fn test_format() {
        let dt = Utc.with_ymd_and_hms(2024, 12, 25, 9, 5, 0).unwrap();
        assert_eq!(Timestamp::from(dt).format("%Y/%m/%d %H:%M"), "2024/12/25 09:05");
    }
}
