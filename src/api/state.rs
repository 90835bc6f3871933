//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::notify::NotificationHub;
use crate::poller::ReadingCache;
use crate::query::QueryService;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Cached current values and persisted-history queries
    pub queries: QueryService,
    /// Cache refreshed by the poller
    pub cache: Arc<ReadingCache>,
    /// Hub the poller publishes value changes on
    pub hub: Arc<NotificationHub>,
    /// Loaded configuration
    pub config: Arc<Config>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        queries: QueryService,
        cache: Arc<ReadingCache>,
        hub: Arc<NotificationHub>,
        config: Config,
    ) -> Self {
        Self {
            queries,
            cache,
            hub,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
