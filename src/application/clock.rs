// Wall-clock source for timestamps and enforcement deadlines
use chrono::{DateTime, Local, TimeZone, Utc};

pub trait Clock: Send + Sync {
    /// Epoch milliseconds of the local wall-clock time.
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        local_equivalent_ms(Utc::now().timestamp_millis())
    }
}

/// Express a UTC instant as local wall-clock time read as if it were UTC.
pub fn local_equivalent_ms(utc_ms: i64) -> i64 {
    match DateTime::from_timestamp_millis(utc_ms) {
        Some(utc) => utc.with_timezone(&Local).naive_local().and_utc().timestamp_millis(),
        None => utc_ms,
    }
}

/// Inverse of [`local_equivalent_ms`]. Ambiguous wall-clock times resolve to
/// the earlier instant; times skipped by a DST jump are returned unchanged.
pub fn utc_ms_from_local_equivalent(local_ms: i64) -> i64 {
    DateTime::from_timestamp_millis(local_ms)
        .and_then(|dt| Local.from_local_datetime(&dt.naive_utc()).earliest())
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(local_ms)
}

#[cfg(test)]
pub use manual::ManualClock;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_equivalent_round_trip() {
        let utc = 1_767_225_600_000;
        assert_eq!(utc_ms_from_local_equivalent(local_equivalent_ms(utc)), utc);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(10);
        clock.advance(5);
        assert_eq!(clock.now_ms(), 15);
        clock.set(1);
        assert_eq!(clock.now_ms(), 1);
    }
}
