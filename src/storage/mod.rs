//! Envwatch Reading Store
//!
//! Durable time series of temperature and humidity readings:
//!
//! - **types**: Core data structures (MetricKind, Reading, JoinedReading)
//! - **store**: SQLite-backed store with range, average, and join queries
//! - **error**: Error types
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//!   Poller tick → insert (writer connection) → readings table
//!
//! Read Path:
//!   Query Service → reader connection → index (metric, taken_at) → Results
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use envwatch::storage::{MetricKind, ReadingStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = ReadingStore::open("./data/readings.db")?;
//!
//!     store.insert(MetricKind::Temperature, 21.3).await?;
//!
//!     let recent = store.fetch_last(MetricKind::Temperature, 10).await?;
//!     println!("{} recent readings", recent.len());
//!
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{StorageError, StorageResult};
pub use store::ReadingStore;
pub use types::{JoinedReading, MetricKind, Reading, STORED_TIMESTAMP_FORMAT};
