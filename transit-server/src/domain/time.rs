//! Time handling for upstream feeds.
//!
//! The departure board reports wall-clock timestamps as fixed-width
//! `YYMMDDHHMM` strings in German local time. Everything past the feed
//! boundary uses `DateTime<Utc>`; local time only comes back when a value is
//! keyed by calendar (statistics months, trip-search dates).

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Europe::Berlin;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error returned when parsing an invalid timestamp string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid time: {reason}")]
pub struct TimeError {
    reason: &'static str,
}

impl TimeError {
    fn new(reason: &'static str) -> Self {
        Self { reason }
    }
}

/// Parse a board timestamp (`YYMMDDHHMM`, Europe/Berlin) into UTC.
///
/// During the autumn DST change the local hour repeats; the earlier instant
/// is used. Local times skipped by the spring change are rejected.
///
/// # Examples
///
/// ```
/// use transit_server::domain::parse_board_timestamp;
///
/// // 10:00 CEST is 08:00 UTC
/// let t = parse_board_timestamp("2410151000").unwrap();
/// assert_eq!(t.to_rfc3339(), "2024-10-15T08:00:00+00:00");
///
/// assert!(parse_board_timestamp("24101510").is_err());
/// assert!(parse_board_timestamp("2413151000").is_err());
/// ```
pub fn parse_board_timestamp(s: &str) -> Result<DateTime<Utc>, TimeError> {
    // Must be exactly 10 characters: YYMMDDHHMM
    if s.len() != 10 {
        return Err(TimeError::new("expected YYMMDDHHMM format"));
    }

    let bytes = s.as_bytes();

    let year =
        parse_two_digits(&bytes[0..2]).ok_or_else(|| TimeError::new("invalid year digits"))?;
    let month =
        parse_two_digits(&bytes[2..4]).ok_or_else(|| TimeError::new("invalid month digits"))?;
    let day =
        parse_two_digits(&bytes[4..6]).ok_or_else(|| TimeError::new("invalid day digits"))?;
    let hour =
        parse_two_digits(&bytes[6..8]).ok_or_else(|| TimeError::new("invalid hour digits"))?;
    let minute =
        parse_two_digits(&bytes[8..10]).ok_or_else(|| TimeError::new("invalid minute digits"))?;

    let date = NaiveDate::from_ymd_opt(2000 + year as i32, month, day)
        .ok_or_else(|| TimeError::new("invalid calendar date"))?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)
        .ok_or_else(|| TimeError::new("invalid time of day"))?;

    from_local(date.and_time(time))
}

/// Interpret a naive German wall-clock time as an instant.
pub fn from_local(local: NaiveDateTime) -> Result<DateTime<Utc>, TimeError> {
    Berlin
        .from_local_datetime(&local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| TimeError::new("local time does not exist"))
}

/// Calendar date of an instant in German local time.
pub fn local_date(ts: DateTime<Utc>) -> NaiveDate {
    ts.with_timezone(&Berlin).date_naive()
}

/// `yyyyMMddHHmm` in German local time, as the composition endpoint expects.
pub fn composition_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Berlin).format("%Y%m%d%H%M").to_string()
}

/// A calendar month, used to key the statistics cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    /// The German-local calendar month containing `ts`.
    pub fn of(ts: DateTime<Utc>) -> Self {
        let local = ts.with_timezone(&Berlin);
        Self {
            year: local.year(),
            month: local.month(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Parse two ASCII digit bytes into a u32.
fn parse_two_digits(bytes: &[u8]) -> Option<u32> {
    if bytes.len() != 2 {
        return None;
    }
    let d1 = (bytes[0] as char).to_digit(10)?;
    let d2 = (bytes[1] as char).to_digit(10)?;
    Some(d1 * 10 + d2)
}
