//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only timestamp truncated to seconds
//! precision, matching the RFC-3339 rendering used across the
//! persisted record formats.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time, truncated to seconds.
    pub fn now() -> Self {
        let now = Utc::now();
        Self(now.with_nanosecond(0).unwrap_or(now))
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt.with_nanosecond(0).unwrap_or(dt))
    }

    /// The Unix epoch, used as a sentinel for "never set."
    pub fn zero() -> Self {
        Self(DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is representable"))
    }

    /// Whether this timestamp is the zero sentinel.
    pub fn is_zero(&self) -> bool {
        *self == Self::zero()
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as ISO8601 with Z suffix (e.g., `2026-01-15T12:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// Duration elapsed between `self` and `later`, saturating at zero
    /// if `later` precedes `self`.
    pub fn elapsed_until(&self, later: Timestamp) -> std::time::Duration {
        let delta = later.0 - self.0;
        delta.to_std().unwrap_or(std::time::Duration::ZERO)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sentinel_is_non_zero_check() {
        assert!(Timestamp::zero().is_zero());
        assert!(!Timestamp::now().is_zero());
    }

    #[test]
    fn iso8601_round_trip_has_z_suffix() {
        let ts = Timestamp::now();
        assert!(ts.to_iso8601().ends_with('Z'));
    }

    #[test]
    fn ordering_matches_wall_clock() {
        let a = Timestamp::zero();
        let b = Timestamp::now();
        assert!(a < b);
    }
}
