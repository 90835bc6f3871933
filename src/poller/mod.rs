//! Polling Cache
//!
//! Samples the sensor on a fixed 2 second cadence, persists every sample,
//! keeps the last-known value per metric, and publishes changes.
//!
//! ```text
//! Sensor → Poller::tick → ReadingStore::insert
//!                       → ReadingCache::update ──changed──→ NotificationHub::publish
//! ```

mod cache;
mod sampler;

pub use cache::ReadingCache;
pub use sampler::{Poller, TickOutcome, SAMPLE_INTERVAL};
