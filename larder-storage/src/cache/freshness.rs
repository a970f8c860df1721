//! Freshness window over record creation times.
//!
//! A record is fresh iff it was created strictly after `now - window`.
//! The boundary is strict: a record exactly one window old is stale. A
//! zero-hour window makes every record stale, turning each fetch into a
//! forced refresh.

use larder_core::{hours_past, ConfigError, Timestamp};

use super::traits::CacheRecord;

/// Default time-to-live for cached records, in hours.
pub const DEFAULT_REFRESH_INTERVAL_HOURS: i64 = 24;

/// Time-to-live window for one record kind.
///
/// A plain validated scalar. Negative intervals are a configuration
/// error and are rejected here, at the boundary, so the filter itself
/// never has to reason about them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessWindow {
    hours: i64,
}

impl FreshnessWindow {
    /// Create a window of the given number of hours.
    pub fn from_hours(hours: i64) -> Result<Self, ConfigError> {
        if hours < 0 {
            return Err(ConfigError::NegativeRefreshInterval { hours });
        }
        Ok(Self { hours })
    }

    // Caller guarantees non-negative.
    pub(crate) fn from_hours_unchecked(hours: i64) -> Self {
        Self { hours }
    }

    /// The window length in hours.
    pub fn hours(&self) -> i64 {
        self.hours
    }

    /// Oldest creation time still considered fresh at `now`, exclusive.
    pub fn cutoff(&self, now: Timestamp) -> Timestamp {
        hours_past(now, self.hours)
    }

    /// Whether a record created at `created_at` is fresh at `now`.
    ///
    /// Strict inequality: `created_at == cutoff` is stale.
    pub fn is_fresh(&self, created_at: Timestamp, now: Timestamp) -> bool {
        created_at > self.cutoff(now)
    }

    /// Filter `records` to those fresh at `now`, ordered by ascending
    /// record id.
    ///
    /// Pure filter over whatever the storage query returned; the key
    /// equality match is the backend's responsibility.
    pub fn fresh_only<R: CacheRecord>(&self, mut records: Vec<R>, now: Timestamp) -> Vec<R> {
        records.retain(|r| self.is_fresh(r.created_at(), now));
        records.sort_by_key(CacheRecord::record_id);
        records
    }
}

impl Default for FreshnessWindow {
    fn default() -> Self {
        Self {
            hours: DEFAULT_REFRESH_INTERVAL_HOURS,
        }
    }
}
