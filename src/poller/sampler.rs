//! Sampling loop
//!
//! One tick: read the sensor, persist both values, then update the cache and
//! notify listeners for each metric whose value changed.
//!
//! A failed or timed-out read skips the whole tick. A failed insert is logged
//! and does not stop the cache update or the notification for that sample.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};

use super::cache::ReadingCache;
use crate::notify::NotificationHub;
use crate::sensor::{SensorError, SensorSample, SensorSource};
use crate::storage::{MetricKind, ReadingStore};

/// Fixed sampling period. The DHT22 must not be read more than once every 2 seconds.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(2);

/// Result of a single tick
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// The sensor read failed; nothing was stored, cached, or published
    Skipped,
    /// The sensor returned a sample
    Sampled {
        sample: SensorSample,
        /// Metrics whose cached value changed and were published
        changed: Vec<MetricKind>,
        /// False if any insert failed
        persisted: bool,
    },
}

/// Owns the sampling loop and the side effects of every sample
pub struct Poller {
    sensor: Arc<dyn SensorSource>,
    store: ReadingStore,
    cache: Arc<ReadingCache>,
    hub: Arc<NotificationHub>,
    sensor_timeout: Duration,
    period: Duration,
}

impl Poller {
    pub fn new(
        sensor: Arc<dyn SensorSource>,
        store: ReadingStore,
        cache: Arc<ReadingCache>,
        hub: Arc<NotificationHub>,
        sensor_timeout: Duration,
    ) -> Self {
        Self {
            sensor,
            store,
            cache,
            hub,
            sensor_timeout,
            period: SAMPLE_INTERVAL,
        }
    }

    /// Run one sampling cycle
    pub async fn tick(&self) -> TickOutcome {
        let sample = match self.read_sensor().await {
            Ok(sample) => sample,
            Err(e) => {
                tracing::warn!(sensor = self.sensor.name(), error = %e, "Sensor read failed, skipping tick");
                return TickOutcome::Skipped;
            }
        };

        tracing::debug!(
            temperature = sample.temperature,
            humidity = sample.humidity,
            "Live sensor readings"
        );

        let values = [
            (MetricKind::Temperature, sample.temperature),
            (MetricKind::Humidity, sample.humidity),
        ];

        let mut persisted = true;
        for (metric, value) in values {
            if let Err(e) = self.store.insert(metric, value).await {
                persisted = false;
                tracing::error!(metric = %metric, value, error = %e, "Failed to persist reading");
            }
        }

        let mut changed = Vec::new();
        for (metric, value) in values {
            if self.cache.update(metric, value) {
                tracing::info!(
                    metric = %metric,
                    "Live {} change detected: {}{}",
                    metric,
                    value,
                    metric.unit()
                );
                self.hub.publish(metric, value);
                changed.push(metric);
            }
        }

        TickOutcome::Sampled {
            sample,
            changed,
            persisted,
        }
    }

    /// Start the fixed-interval loop on the runtime
    ///
    /// The loop never ends on its own; abort the handle to stop it.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                sensor = self.sensor.name(),
                period_ms = self.period.as_millis() as u64,
                "Sampling loop started"
            );

            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }

    async fn read_sensor(&self) -> Result<SensorSample, SensorError> {
        match timeout(self.sensor_timeout, self.sensor.read()).await {
            Ok(result) => result,
            Err(_) => Err(SensorError::Timeout(self.sensor_timeout.as_millis() as u64)),
        }
    }

    #[cfg(test)]
    fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }
}
