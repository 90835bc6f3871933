//! Envwatch Query Layer
//!
//! Translates dashboard requests into reading cache and store calls:
//!
//! - **window**: `start`/`end` parsing and the "today" default window
//! - **service**: current, history, range, average, and joined "today" queries
//!
//! # Example
//!
//! ```rust,ignore
//! use envwatch::query::{QueryService, TimeWindow};
//! use envwatch::storage::MetricKind;
//!
//! let service = QueryService::new(store, cache, 10, 15);
//!
//! // Last 10 readings, oldest first
//! let history = service.history(MetricKind::Temperature).await?;
//!
//! // Average since midnight
//! let avg = service.average(MetricKind::Humidity, TimeWindow::today()).await?;
//! ```

mod error;
mod service;
mod window;

pub use error::{QueryError, QueryResult};
pub use service::{format_value, QueryService, DEFAULT_HISTORY_LIMIT, DEFAULT_TODAY_INTERVAL_MINUTES};
pub use window::{parse_timestamp, TimeWindow};
