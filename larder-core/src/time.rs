//! UTC time helpers for freshness arithmetic.
//!
//! Every relative helper takes the current time as an explicit argument.
//! The baseline is never captured once and reused across calls; callers
//! compute `now_utc()` per fetch.

use chrono::{DateTime, Duration, Timelike, Utc};

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Current UTC time truncated to whole seconds.
///
/// Truncation keeps boundary comparisons stable when timestamps round-trip
/// through storage backends with second precision.
pub fn now_utc() -> Timestamp {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

/// `now` shifted `hours` into the past.
pub fn hours_past(now: Timestamp, hours: i64) -> Timestamp {
    now - Duration::hours(hours)
}

/// `now` shifted `hours` into the future.
pub fn hours_future(now: Timestamp, hours: i64) -> Timestamp {
    now + Duration::hours(hours)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_utc_has_no_subsecond_component() {
        let now = now_utc();
        assert_eq!(now.nanosecond(), 0);
    }

    #[test]
    fn test_hours_past_and_future_are_symmetric() {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(hours_future(hours_past(base, 12), 12), base);
    }

    #[test]
    fn test_hours_past_zero_is_identity() {
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        assert_eq!(hours_past(base, 0), base);
    }

    #[test]
    fn test_helpers_use_caller_supplied_baseline() {
        // Two different baselines must yield two different results; the
        // baseline is a parameter, not state captured at startup.
        let a = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
        assert_ne!(hours_past(a, 24), hours_past(b, 24));
        assert_eq!(hours_past(b, 24), a);
    }
}
