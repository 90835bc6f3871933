//! WebSocket Message Types
//!
//! Defines all message types for WebSocket communication between
//! dashboard clients and the envwatch server.

use serde::{Deserialize, Serialize};

use crate::storage::MetricKind;

/// Messages sent from client to server
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Start receiving change events for these metrics
    Subscribe { metrics: Vec<MetricKind> },
    /// Stop receiving change events for these metrics
    Unsubscribe { metrics: Vec<MetricKind> },
    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Connection established; the connection starts subscribed to every metric
    Connected {
        #[serde(rename = "connectionId")]
        connection_id: String,
    },
    /// Temperature changed
    NewTemperature { value: f64 },
    /// Humidity changed
    NewHumidity { value: f64 },
    /// Subscription confirmed
    Subscribed { metrics: Vec<MetricKind> },
    /// Unsubscription confirmed
    Unsubscribed { metrics: Vec<MetricKind> },
    /// Pong response to ping
    Pong,
    /// Error message
    Error { message: String },
}

impl ServerMessage {
    /// Change event for a metric
    pub fn new_value(metric: MetricKind, value: f64) -> Self {
        match metric {
            MetricKind::Temperature => ServerMessage::NewTemperature { value },
            MetricKind::Humidity => ServerMessage::NewHumidity { value },
        }
    }
}
