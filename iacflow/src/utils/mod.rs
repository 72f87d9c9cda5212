//! Run ids and timestamps for events and logs.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generates a time-ordered run id (UUIDv7).
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::now_v7()
}

/// Returns the current UTC time.
#[must_use]
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Returns the current UTC time as an RFC 3339 string with microseconds.
#[must_use]
pub fn iso_timestamp() -> String {
    now_utc().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Converts a duration to whole milliseconds, saturating.
#[must_use]
pub fn duration_ms(duration: std::time::Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
