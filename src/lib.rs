//! # envwatch
//!
//! Environmental telemetry dashboard backend: samples a temperature/humidity
//! sensor every two seconds, persists the readings to SQLite, and serves the
//! current values, history, and aggregates over HTTP with live WebSocket push.
//!
//! ## Modules
//!
//! - [`sensor`]: Sensor sources (simulated drift or an external reader program)
//! - [`storage`]: SQLite reading store
//! - [`poller`]: Sampling loop and the current-value cache
//! - [`notify`]: Publish/subscribe hub for value changes
//! - [`query`]: History, range, and average queries
//! - [`api`]: REST API server with Axum
//! - [`websocket`]: Live push of value changes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use envwatch::notify::NotificationHub;
//! use envwatch::poller::{Poller, ReadingCache};
//! use envwatch::sensor::SimulatedSensor;
//! use envwatch::storage::{MetricKind, ReadingStore};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ReadingStore::open("readings.db")?;
//!     let cache = Arc::new(ReadingCache::new());
//!     let hub = Arc::new(NotificationHub::default());
//!
//!     let _handle = hub.subscribe(MetricKind::Temperature, |value| {
//!         println!("temperature is now {value:.1}");
//!         Ok(())
//!     })?;
//!
//!     let poller = Arc::new(Poller::new(
//!         Arc::new(SimulatedSensor::new(22.0, 45.0, 0)),
//!         store,
//!         cache,
//!         hub,
//!         Duration::from_millis(1500),
//!     ));
//!     poller.start().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod notify;
pub mod poller;
pub mod query;
pub mod sensor;
pub mod storage;
pub mod websocket;

pub use config::Config;
pub use storage::{MetricKind, Reading, ReadingStore};
