//! Date normalization for the formats bank APIs actually emit.
//!
//! Upstream sources disagree wildly: plain ISO dates, ISO datetimes with and
//! without offsets, `"Nov 3, 2025"`, `MM/DD/YYYY`. Everything collapses to a
//! [`NaiveDate`] before a record leaves a plugin.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Parse a date in any of the formats observed across bank endpoints.
pub fn parse_flexible(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(datetime) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(datetime.date_naive());
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(datetime.date());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%b %d, %Y") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%B %d, %Y") {
        return Some(date);
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%m/%d/%Y") {
        return Some(date);
    }
    None
}
