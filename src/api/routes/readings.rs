//! Reading Routes
//!
//! Per-metric routes are mounted once per [`MetricKind`]; the metric reaches
//! the handlers as a request extension.
//!
//! - GET /{metric}          - Current cached value
//! - GET /{metric}/history  - Last readings, oldest first
//! - GET /{metric}/range    - Readings inside `start`/`end` (defaults to today)
//! - GET /{metric}/average  - Mean inside `start`/`end` (defaults to today)
//! - GET /readings/today    - Joined temperature/humidity series

use axum::{
    extract::{Query, State},
    Extension, Json,
};
use std::sync::Arc;

use crate::api::dto::{RangeParams, ValueResponse};
use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::query::TimeWindow;
use crate::storage::{JoinedReading, MetricKind, Reading};

/// GET /{metric}
pub async fn current(
    State(state): State<Arc<AppState>>,
    Extension(metric): Extension<MetricKind>,
) -> Json<ValueResponse> {
    Json(ValueResponse::from_value(state.queries.current(metric)))
}

/// GET /{metric}/history
pub async fn history(
    State(state): State<Arc<AppState>>,
    Extension(metric): Extension<MetricKind>,
) -> ApiResult<Json<Vec<Reading>>> {
    Ok(Json(state.queries.history(metric).await?))
}

/// GET /{metric}/range?start&end
pub async fn range(
    State(state): State<Arc<AppState>>,
    Extension(metric): Extension<MetricKind>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Json<Vec<Reading>>> {
    let window = TimeWindow::from_params(params.start.as_deref(), params.end.as_deref())?;
    Ok(Json(state.queries.range(metric, window).await?))
}

/// GET /{metric}/average?start&end
///
/// An empty window answers `{"value": null}`.
pub async fn average(
    State(state): State<Arc<AppState>>,
    Extension(metric): Extension<MetricKind>,
    Query(params): Query<RangeParams>,
) -> ApiResult<Json<ValueResponse>> {
    let window = TimeWindow::from_params(params.start.as_deref(), params.end.as_deref())?;
    let value = state.queries.average(metric, window).await?;
    Ok(Json(ValueResponse::from_value(value)))
}

/// GET /readings/today
pub async fn today(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<JoinedReading>>> {
    Ok(Json(state.queries.today_readings().await?))
}
