//! Query Service
//!
//! Turns dashboard requests into reading cache and store calls. Holds no state
//! of its own beyond the deployment's history length and join interval.

use std::sync::Arc;

use crate::poller::ReadingCache;
use crate::storage::{JoinedReading, MetricKind, Reading, ReadingStore};

use super::error::QueryResult;
use super::window::TimeWindow;

/// Default number of readings returned by a history query
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

/// Default minute grid for the joined "today" series
pub const DEFAULT_TODAY_INTERVAL_MINUTES: u32 = 15;

/// Read-side access to persisted readings
#[derive(Clone)]
pub struct QueryService {
    store: ReadingStore,
    cache: Arc<ReadingCache>,
    history_limit: usize,
    today_interval_minutes: u32,
}

impl QueryService {
    pub fn new(
        store: ReadingStore,
        cache: Arc<ReadingCache>,
        history_limit: usize,
        today_interval_minutes: u32,
    ) -> Self {
        Self {
            store,
            cache,
            history_limit,
            today_interval_minutes,
        }
    }

    /// Most recent sampled value, `None` before the first successful sample
    pub fn current(&self, metric: MetricKind) -> Option<f64> {
        self.cache.get(metric)
    }

    /// Last `history_limit` readings, oldest first
    pub async fn history(&self, metric: MetricKind) -> QueryResult<Vec<Reading>> {
        let mut readings = self.store.fetch_last(metric, self.history_limit).await?;
        readings.reverse();
        Ok(readings)
    }

    /// Readings strictly inside the window, oldest first
    ///
    /// An inverted window (`start` after `end`) yields an empty list.
    pub async fn range(&self, metric: MetricKind, window: TimeWindow) -> QueryResult<Vec<Reading>> {
        Ok(self
            .store
            .fetch_between(metric, window.start, window.end)
            .await?)
    }

    /// Mean value strictly inside the window, `None` if it holds no readings
    pub async fn average(&self, metric: MetricKind, window: TimeWindow) -> QueryResult<Option<f64>> {
        Ok(self.store.average(metric, window.start, window.end).await?)
    }

    /// Today's temperature/humidity pairs on the configured minute grid
    pub async fn today_readings(&self) -> QueryResult<Vec<JoinedReading>> {
        let window = TimeWindow::today();
        Ok(self
            .store
            .fetch_joined_at_interval(window.start, window.end, self.today_interval_minutes)
            .await?)
    }

    /// Underlying store, for health checks
    pub fn store(&self) -> &ReadingStore {
        &self.store
    }
}

/// Render a value with one decimal place
pub fn format_value(value: f64) -> String {
    format!("{:.1}", value)
}
