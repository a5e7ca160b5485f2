//! Optional date normalization for response bodies
//!
//! The platform returns dates in several ISO-8601 shapes. With
//! `convertDates` enabled every string value that parses as one is
//! rewritten to RFC 3339 UTC with millisecond precision; date-only values
//! become midnight UTC. Anything else is left alone.

use crate::types::JsonValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Cheap shape check before attempting a parse
static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?$")
        .expect("date pattern is valid")
});

/// Parse an ISO-8601 date or date-time. Values without an offset are UTC.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if !ISO_DATE.is_match(value) {
        return None;
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f%#z", "%Y-%m-%d %H:%M:%S%.f%#z"] {
        if let Ok(at) = DateTime::parse_from_str(value, format) {
            return Some(at.with_timezone(&Utc));
        }
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(at) = NaiveDateTime::parse_from_str(value, format) {
            return Some(at.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
}

/// Format as RFC 3339 UTC with milliseconds (`2024-01-02T03:04:05.000Z`)
pub fn format_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Rewrite every date-like string in a JSON tree
pub fn normalize_dates(value: &mut JsonValue) {
    match value {
        JsonValue::String(s) => {
            if let Some(at) = parse_date(s) {
                *s = format_date(at);
            }
        }
        JsonValue::Array(items) => items.iter_mut().for_each(normalize_dates),
        JsonValue::Object(map) => map.values_mut().for_each(normalize_dates),
        _ => {}
    }
}
