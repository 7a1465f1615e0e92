//! Timestamp helpers shared by model, codec and storage.
//!
//! # Invariants
//! - Domain timestamps carry millisecond precision (the storage unit), so a
//!   value survives both the text encoding and the database unchanged.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// Current time truncated to milliseconds.
pub fn now() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

/// Drops sub-millisecond precision.
pub fn truncate_to_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    from_millis(value.timestamp_millis()).unwrap_or(value)
}

pub fn to_millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

/// Converts epoch milliseconds; `None` when out of chrono's range.
pub fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Formats an ISO-8601 / RFC 3339 UTC timestamp, e.g. `2024-01-01T12:00:00.000Z`.
pub fn format_iso(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses ISO-8601 input.
///
/// Accepts RFC 3339 with offset, naive date-times (read as UTC, `T` or space
/// separated, optional fraction) and bare dates (midnight UTC). The result
/// is truncated to milliseconds.
pub fn parse_iso(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(truncate_to_millis(parsed.with_timezone(&Utc)));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(truncate_to_millis(naive.and_utc()));
        }
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
