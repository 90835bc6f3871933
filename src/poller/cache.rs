//! Last-known value per metric
//!
//! Written only by the sampling loop, read by any number of HTTP handlers.
//! Each slot is replaced under a short write lock, so readers see either the
//! previous value or the new one.

use std::sync::{PoisonError, RwLock};

use crate::storage::MetricKind;

#[derive(Debug, Default, Clone, Copy)]
struct Slots {
    temperature: Option<f64>,
    humidity: Option<f64>,
}

impl Slots {
    fn slot_mut(&mut self, metric: MetricKind) -> &mut Option<f64> {
        match metric {
            MetricKind::Temperature => &mut self.temperature,
            MetricKind::Humidity => &mut self.humidity,
        }
    }

    fn slot(&self, metric: MetricKind) -> Option<f64> {
        match metric {
            MetricKind::Temperature => self.temperature,
            MetricKind::Humidity => self.humidity,
        }
    }
}

/// In-memory cache of the most recent sampled values
///
/// Every slot starts unset (`None`) and stays that way until the first
/// successful sample for that metric.
#[derive(Debug, Default)]
pub struct ReadingCache {
    slots: RwLock<Slots>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last cached value for a metric
    pub fn get(&self, metric: MetricKind) -> Option<f64> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .slot(metric)
    }

    /// Store `value` if it differs from the cached one
    ///
    /// Returns true when the slot changed, including the first value after unset.
    pub fn update(&self, metric: MetricKind, value: f64) -> bool {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.slot_mut(metric);

        if *slot == Some(value) {
            return false;
        }
        *slot = Some(value);
        true
    }

    pub fn current_temperature(&self) -> Option<f64> {
        self.get(MetricKind::Temperature)
    }

    pub fn current_humidity(&self) -> Option<f64> {
        self.get(MetricKind::Humidity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unset() {
        let cache = ReadingCache::new();
        assert_eq!(cache.current_temperature(), None);
        assert_eq!(cache.current_humidity(), None);
    }

    #[test]
    fn test_update_reports_changes() {
        let cache = ReadingCache::new();

        assert!(cache.update(MetricKind::Temperature, 20.0));
        assert!(!cache.update(MetricKind::Temperature, 20.0));
        assert!(cache.update(MetricKind::Temperature, 20.1));

        assert_eq!(cache.current_temperature(), Some(20.1));
        assert_eq!(cache.current_humidity(), None);
    }

    #[test]
    fn test_metrics_are_independent() {
        let cache = ReadingCache::new();

        cache.update(MetricKind::Humidity, 45.0);
        assert!(cache.update(MetricKind::Temperature, 45.0));
        assert_eq!(cache.get(MetricKind::Humidity), Some(45.0));
        assert_eq!(cache.get(MetricKind::Temperature), Some(45.0));
    }
}
