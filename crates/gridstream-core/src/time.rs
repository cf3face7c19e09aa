//! Nanosecond timestamp helpers.
//!
//! Telemetry timestamps are expressed in nanoseconds relative to the
//! session epoch; session start times are nanoseconds since the Unix
//! epoch.

use std::time::{SystemTime, UNIX_EPOCH};

/// Nanoseconds per millisecond.
pub const NANOS_PER_MILLI: i64 = 1_000_000;

/// Nanoseconds per second.
pub const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Returns the current wall clock as nanoseconds since the Unix epoch.
///
/// Saturates at `i64::MAX` rather than panicking on clock anomalies.
#[must_use]
pub fn wall_clock_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
}

/// Converts a nanosecond timestamp to whole milliseconds.
#[must_use]
pub fn nanos_to_millis(nanos: i64) -> i64 {
    nanos / NANOS_PER_MILLI
}

/// Converts whole milliseconds to nanoseconds.
#[must_use]
pub fn millis_to_nanos(millis: i64) -> i64 {
    millis * NANOS_PER_MILLI
}
