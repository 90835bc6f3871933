//! Time windows for range and average queries
//!
//! All times are naive local wall-clock times, matching how readings are stamped.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use super::error::{QueryError, QueryResult};

/// A `[start, end]` pair handed to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Local midnight through the current instant
    pub fn today() -> Self {
        Self::today_at(Local::now().naive_local())
    }

    /// Midnight of `now`'s day through `now`
    pub fn today_at(now: NaiveDateTime) -> Self {
        Self {
            start: now.date().and_time(NaiveTime::MIN),
            end: now,
        }
    }

    /// Fill in missing bounds from today's window, computed now
    pub fn resolve(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self::resolve_at(start, end, Local::now().naive_local())
    }

    /// Fill in missing bounds: start defaults to midnight, end to `now`
    pub fn resolve_at(
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Self {
        let today = Self::today_at(now);
        Self {
            start: start.unwrap_or(today.start),
            end: end.unwrap_or(today.end),
        }
    }

    /// Parse optional `start`/`end` request parameters and resolve the window
    pub fn from_params(start: Option<&str>, end: Option<&str>) -> QueryResult<Self> {
        let start = start.filter(|s| !s.trim().is_empty()).map(parse_timestamp).transpose()?;
        let end = end.filter(|s| !s.trim().is_empty()).map(parse_timestamp).transpose()?;
        Ok(Self::resolve(start, end))
    }
}

/// Shorter digit runs are not treated as epoch milliseconds
const MIN_EPOCH_MILLIS_DIGITS: usize = 10;

/// Parse a timestamp request parameter into local wall-clock time
///
/// Accepts Unix milliseconds (at least 10 digits), RFC 3339 (converted to local time),
/// `YYYY-MM-DDTHH:MM[:SS]`, `YYYY-MM-DD HH:MM[:SS]`, or a bare date (midnight).
pub fn parse_timestamp(s: &str) -> QueryResult<NaiveDateTime> {
    let s = s.trim();

    // Raw milliseconds, as produced by Date.now() in the browser. Shorter
    // digit runs (a bare year, say) are rejected rather than read as 1970.
    if s.len() >= MIN_EPOCH_MILLIS_DIGITS && s.bytes().all(|b| b.is_ascii_digit()) {
        let ms: i64 = s
            .parse()
            .map_err(|_| QueryError::InvalidTimestamp(s.to_string()))?;
        return Local
            .timestamp_millis_opt(ms)
            .single()
            .map(|dt| dt.naive_local())
            .ok_or_else(|| QueryError::InvalidTimestamp(s.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Local).naive_local());
    }

    const FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ];
    for format in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(NaiveTime::MIN));
    }

    Err(QueryError::InvalidTimestamp(s.to_string()))
}
