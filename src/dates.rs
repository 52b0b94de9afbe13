//! Date normalization for stored date strings.
//!
//! The booking tables carry dates in three formats depending on which part of
//! the system wrote them. Every reader goes through this module and tags the
//! format of the field it is reading, instead of guessing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// `dd-mm-yyyy`, e.g. "21-03-2026". Resolves to midnight UTC of that day.
    DayMonthYear,
    /// `dd-mm-yyyyThh:mm`, e.g. "21-03-2026T18:30", taken as UTC.
    DayMonthYearTime,
    /// RFC 3339, e.g. "2026-03-21T18:30:00Z".
    Rfc3339,
}

#[derive(Error, Debug)]
#[error("cannot parse {raw:?} as {format:?}")]
pub struct DateParseError {
    pub raw: String,
    pub format: DateFormat,
}

pub fn parse_utc(format: DateFormat, raw: &str) -> Result<DateTime<Utc>, DateParseError> {
    let err = || DateParseError {
        raw: raw.to_string(),
        format,
    };

    match format {
        DateFormat::DayMonthYear => NaiveDate::parse_from_str(raw, "%d-%m-%Y")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
            .ok_or_else(err),
        DateFormat::DayMonthYearTime => NaiveDateTime::parse_from_str(raw, "%d-%m-%YT%H:%M")
            .map(|dt| dt.and_utc())
            .map_err(|_| err()),
        DateFormat::Rfc3339 => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| err()),
    }
}

/// Format a timestamp back into `dd-mm-yyyy`, the format the schedule
/// tables use for participant start dates.
pub fn format_day(dt: DateTime<Utc>) -> String {
    dt.format("%d-%m-%Y").to_string()
}
