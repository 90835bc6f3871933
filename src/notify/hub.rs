//! Notification Hub
//!
//! Publish/subscribe registry keyed by metric kind. Each subscription gets an
//! opaque [`SubscriptionHandle`]; the same handle is required to unsubscribe.
//!
//! `publish` snapshots the listeners for a metric under a read lock, releases
//! the lock, and only then invokes them. Listeners may therefore subscribe or
//! unsubscribe (themselves or others) while a broadcast is in flight without
//! deadlocking or disturbing delivery to the rest of the snapshot.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

use crate::storage::MetricKind;

/// Callback invoked with each new value of a metric
pub type Listener = Arc<dyn Fn(f64) -> Result<(), ListenerError> + Send + Sync>;

/// Opaque token identifying one subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    metric: MetricKind,
    id: u64,
}

impl SubscriptionHandle {
    /// Metric this subscription listens to
    pub fn metric(&self) -> MetricKind {
        self.metric
    }
}

/// Configuration for the notification hub
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum number of listeners registered for one metric
    pub max_listeners_per_metric: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_listeners_per_metric: 1000,
        }
    }
}

/// Outcome of one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Listeners that accepted the value
    pub delivered: usize,
    /// Listeners that returned an error or panicked
    pub failed: usize,
}

/// Publish/subscribe registry for value-change notifications
pub struct NotificationHub {
    /// Registered listeners per metric, in registration order
    listeners: RwLock<HashMap<MetricKind, Vec<(u64, Listener)>>>,
    next_id: AtomicU64,
    config: HubConfig,
}

impl NotificationHub {
    /// Create a new hub
    pub fn new(config: HubConfig) -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Register a listener for a metric
    ///
    /// Returns the handle to pass to [`unsubscribe`](Self::unsubscribe), or an
    /// error if the per-metric listener limit has been reached.
    pub fn subscribe<F>(&self, metric: MetricKind, listener: F) -> Result<SubscriptionHandle, HubError>
    where
        F: Fn(f64) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let entries = listeners.entry(metric).or_default();

        if entries.len() >= self.config.max_listeners_per_metric {
            return Err(HubError::TooManyListeners {
                metric,
                limit: self.config.max_listeners_per_metric,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        entries.push((id, Arc::new(listener)));

        tracing::debug!(metric = %metric, subscription = id, "Listener subscribed");
        Ok(SubscriptionHandle { metric, id })
    }

    /// Remove exactly the subscription identified by `handle`
    ///
    /// Returns false if it was already removed.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);

        let Some(entries) = listeners.get_mut(&handle.metric) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|(id, _)| *id != handle.id);
        let removed = entries.len() != before;

        if entries.is_empty() {
            listeners.remove(&handle.metric);
        }

        if removed {
            tracing::debug!(metric = %handle.metric, subscription = handle.id, "Listener unsubscribed");
        }
        removed
    }

    /// Deliver `value` to every listener registered for `metric`
    ///
    /// Listeners run synchronously, in registration order. A failing or
    /// panicking listener is logged and skipped; the rest still receive the value.
    pub fn publish(&self, metric: MetricKind, value: f64) -> PublishReport {
        let snapshot: Vec<(u64, Listener)> = {
            let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner);
            match listeners.get(&metric) {
                Some(entries) => entries.clone(),
                None => return PublishReport::default(),
            }
        };

        let mut report = PublishReport::default();
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| (*listener)(value))) {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!(metric = %metric, subscription = id, error = %e, "Listener failed");
                }
                Err(_) => {
                    report.failed += 1;
                    tracing::error!(metric = %metric, subscription = id, "Listener panicked");
                }
            }
        }

        tracing::trace!(
            metric = %metric,
            value,
            delivered = report.delivered,
            failed = report.failed,
            "Published value"
        );
        report
    }

    /// Number of listeners currently registered for a metric
    pub fn listener_count(&self, metric: MetricKind) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&metric)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(HubConfig::default())
    }
}

/// Error returned by a listener that could not take a value
#[derive(Debug, Error)]
pub enum ListenerError {
    /// The consumer behind the listener is gone (e.g. connection closed)
    #[error("Listener closed")]
    Closed,

    #[error("Listener error: {0}")]
    Other(String),
}

/// Errors that can occur in the notification hub
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Too many listeners for {metric} (limit: {limit})")]
    TooManyListeners { metric: MetricKind, limit: usize },
}
