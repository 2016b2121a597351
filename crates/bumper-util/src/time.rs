//! Time utilities for bumper
//!
//! Grants are stored and compared in UTC wall-clock time. Expiry has to
//! survive process restarts, so monotonic clocks are of no use here.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `BUMPER_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is useful
//! for exercising expiry and sweeps without waiting for real minutes to pass.
//!
//! Format: `YYYY-MM-DD HH:MM:SS`, interpreted as UTC (e.g., `2025-12-25 14:30:00`)
//!
//! Example:
//! ```bash
//! BUMPER_MOCK_TIME="2025-12-25 14:30:00" bumperd grant list
//! ```

use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::OnceLock;
use std::time::Duration;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "BUMPER_MOCK_TIME";

/// Format used for mock time input and for UTC display
pub const UTC_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

/// Returns the offset between mock time and real time at process start.
#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Utc::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match parse_utc(&mock_time_str) {
                    Some(mock_dt) => {
                        let offset = mock_dt.signed_duration_since(Utc::now());
                        tracing::info!(
                            mock_time = %mock_time_str,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    }
                    None => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = UTC_FORMAT,
                            "Invalid mock time format"
                        );
                    }
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current UTC time, respecting mock time settings in debug builds.
///
/// In release builds, this always returns the real system time.
/// In debug builds, if `BUMPER_MOCK_TIME` is set, this returns a time
/// that advances from the mock time at the same rate as real time.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Utc> {
    let real_now = Utc::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// Parse a `YYYY-MM-DD HH:MM:SS` string as a UTC timestamp.
pub fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, UTC_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format a timestamp as `YYYY-MM-DD HH:MM:SS` (UTC, no suffix).
pub fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.format(UTC_FORMAT).to_string()
}

/// Convert whole minutes into a chrono duration.
pub fn minutes(n: u32) -> chrono::Duration {
    chrono::Duration::minutes(i64::from(n))
}

/// Whole minutes left until a deadline, rounded up and floored at zero.
///
/// A grant with 30 seconds left still shows 1 minute; one that is already
/// past its deadline shows 0.
pub fn remaining_minutes_ceil(remaining: chrono::Duration) -> i64 {
    let secs = remaining.num_seconds();
    if secs <= 0 {
        0
    } else {
        (secs + 59) / 60
    }
}

/// Helper to format durations in human-readable form
pub fn format_duration(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
