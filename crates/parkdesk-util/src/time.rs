//! Time utilities for parkdesk
//!
//! All session arithmetic is done in UTC. Local time is only used when
//! rendering timestamps for the operator.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `PARKDESK_MOCK_TIME` environment variable can be set
//! to override the system time. This is useful for exercising overstay
//! billing without waiting for hours to pass.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` in local time (e.g., `2025-12-25 14:30:00`)
//!
//! Example:
//! ```bash
//! PARKDESK_MOCK_TIME="2025-12-25 14:30:00" parkdesk monitor
//! ```

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::sync::OnceLock;

use crate::{ParkdeskError, Result};

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "PARKDESK_MOCK_TIME";

const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Offset between mock time and real time when the process started,
/// so mock time keeps advancing naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // wraps Utc::now()
fn get_mock_time_offset() -> Option<Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match parse_local_datetime(&mock_time_str) {
                    Ok(mock_dt) => {
                        let offset = mock_dt.signed_duration_since(Utc::now());
                        tracing::info!(
                            mock_time = %mock_time_str,
                            offset_secs = offset.num_seconds(),
                            "Mock time enabled"
                        );
                        return Some(offset);
                    }
                    Err(e) => {
                        tracing::warn!(
                            mock_time = %mock_time_str,
                            expected_format = MOCK_TIME_FORMAT,
                            error = %e,
                            "Invalid mock time"
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

/// Get the current time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // the wrapper that provides mock time support
pub fn now() -> DateTime<Utc> {
    let real_now = Utc::now();

    if let Some(offset) = get_mock_time_offset() {
        real_now + offset
    } else {
        real_now
    }
}

/// Parse an operator-supplied local time.
///
/// Accepts `YYYY-MM-DD HH:MM:SS` or a bare `YYYY-MM-DD` (midnight).
pub fn parse_local_datetime(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    let naive = NaiveDateTime::parse_from_str(s, MOCK_TIME_FORMAT)
        .or_else(|_| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        })
        .map_err(|_| ParkdeskError::validation(format!("invalid date/time: {s:?}")))?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ParkdeskError::validation(format!("nonexistent local time: {s:?}")))
}

/// Format a timestamp as a local wall-clock time (e.g. entry time on a card).
pub fn format_clock_time(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%H:%M").to_string()
}

/// Format a timestamp with full local date and time.
pub fn format_datetime_full(dt: &DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format a duration for display ("2h 05m", "12m").
///
/// Negative durations are shown as zero.
pub fn format_duration(d: Duration) -> String {
    let total_mins = d.num_minutes().max(0);
    let hours = total_mins / 60;
    let minutes = total_mins % 60;

    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

/// Format fractional hours with one decimal place.
pub fn format_hours(hours: f64) -> String {
    format!("{:.1}", hours)
}
