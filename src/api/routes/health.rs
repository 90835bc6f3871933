//! Health Routes
//!
//! Health check endpoints for monitoring and Kubernetes probes.
//!
//! - GET /health/live - Liveness probe (process is alive)
//! - GET /health/ready - Readiness probe (ready to serve traffic)
//! - GET /health - Full health status

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{HealthResponse, ReadingCounts};
use crate::api::state::AppState;
use crate::storage::MetricKind;

/// GET /health/live
///
/// Kubernetes liveness probe.
/// Returns 200 if the process is alive, no dependency checks.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// GET /health/ready
///
/// Returns 200 once the reading store answers queries.
pub async fn readiness(State(state): State<Arc<AppState>>) -> StatusCode {
    match reading_counts(&state).await {
        Some(_) => StatusCode::OK,
        None => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// GET /health
///
/// Full health status with component details.
pub async fn full_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let counts = reading_counts(&state).await;
    let storage_ok = counts.is_some();

    let listeners = MetricKind::all()
        .iter()
        .map(|metric| state.hub.listener_count(*metric))
        .sum();

    Json(HealthResponse {
        status: if storage_ok { "healthy" } else { "degraded" }.to_string(),
        storage: if storage_ok { "ok" } else { "error" }.to_string(),
        sensor: state.config.sensor.source.as_str().to_string(),
        temperature: state.cache.current_temperature(),
        humidity: state.cache.current_humidity(),
        readings: counts.unwrap_or_default(),
        listeners,
        uptime_seconds: state.uptime_seconds(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Count persisted readings; `None` if the store cannot be queried
async fn reading_counts(state: &AppState) -> Option<ReadingCounts> {
    let store = state.queries.store();
    let counts = async {
        Ok::<_, crate::storage::StorageError>(ReadingCounts {
            temperature: store.count(MetricKind::Temperature).await?,
            humidity: store.count(MetricKind::Humidity).await?,
        })
    }
    .await;

    match counts {
        Ok(counts) => Some(counts),
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check failed");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_liveness() {
        let status = liveness().await;
        assert_eq!(status, StatusCode::OK);
    }
}
