//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.

use serde::{Deserialize, Serialize};

use crate::query::format_value;

/// Single formatted value, `null` when there is nothing to report
#[derive(Debug, Serialize, PartialEq)]
pub struct ValueResponse {
    pub value: Option<String>,
}

impl ValueResponse {
    pub fn from_value(value: Option<f64>) -> Self {
        Self {
            value: value.map(format_value),
        }
    }
}

/// `start`/`end` query parameters of range and average routes
#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "degraded"
    pub status: String,
    /// Storage status: "ok" or "error"
    pub storage: String,
    /// Sensor source name
    pub sensor: String,
    /// Last cached temperature
    pub temperature: Option<f64>,
    /// Last cached humidity
    pub humidity: Option<f64>,
    /// Readings persisted so far, per metric
    pub readings: ReadingCounts,
    /// Live-push listeners registered on the hub
    pub listeners: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// API version
    pub version: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ReadingCounts {
    pub temperature: u64,
    pub humidity: u64,
}
