//! Core data types for the reading store
//!
//! - `MetricKind`: which of the two tracked series a value belongs to
//! - `Reading`: one persisted, timestamped measurement
//! - `JoinedReading`: a temperature/humidity pair at the same instant

use chrono::{Duration, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::StorageError;

/// Timestamp layout used in the `taken_at` column.
///
/// Second precision, local wall clock. This layout sorts lexicographically in
/// time order and is understood by SQLite's date functions.
pub const STORED_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One of the independently tracked series
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Air temperature in degrees Celsius
    Temperature,
    /// Relative humidity in percent
    Humidity,
}

impl MetricKind {
    /// Get all metric kinds for iteration
    pub fn all() -> &'static [MetricKind] {
        &[MetricKind::Temperature, MetricKind::Humidity]
    }

    /// Name stored in the `metric` column and used in routes
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "temperature",
            MetricKind::Humidity => "humidity",
        }
    }

    /// Unit suffix for human-readable log lines
    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::Temperature => "°C",
            MetricKind::Humidity => "%",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "temperature" => Ok(MetricKind::Temperature),
            "humidity" => Ok(MetricKind::Humidity),
            other => Err(format!("unknown metric kind: {}", other)),
        }
    }
}

/// A single persisted measurement
///
/// Immutable once stored. `taken_at` is assigned by the store at insert time.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Series this reading belongs to
    #[serde(skip)]
    pub metric: MetricKind,
    /// Measured value
    pub value: f64,
    /// Local wall-clock time the store recorded the value
    pub taken_at: NaiveDateTime,
}

/// Temperature and humidity recorded at the same instant
///
/// Produced by the interval join; humidity is absent when no humidity
/// reading shares the temperature reading's timestamp.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JoinedReading {
    pub timestamp: NaiveDateTime,
    pub temperature: f64,
    pub humidity: Option<f64>,
}

/// Format a timestamp the way it is stored in the database
pub fn to_stored(ts: &NaiveDateTime) -> String {
    ts.format(STORED_TIMESTAMP_FORMAT).to_string()
}

/// Smallest whole second not earlier than `ts`
///
/// Stored timestamps have no fraction, so a bound with one must be moved to a
/// whole second before comparison: up for an exclusive end or inclusive start.
pub fn ceil_to_second(ts: &NaiveDateTime) -> NaiveDateTime {
    let whole = ts.trunc_subsecs(0);
    if whole == *ts {
        return whole;
    }
    whole
        .checked_add_signed(Duration::seconds(1))
        .unwrap_or(whole)
}

/// Parse a timestamp read back from the database
pub fn from_stored(s: &str) -> Result<NaiveDateTime, StorageError> {
    NaiveDateTime::parse_from_str(s, STORED_TIMESTAMP_FORMAT)
        .map_err(|e| StorageError::Timestamp(format!("{} ({})", s, e)))
}
