//! Envwatch REST API
//!
//! HTTP API layer for envwatch, built with Axum.
//!
//! # Endpoints
//!
//! ## Readings
//! - `GET /temperature` - Current cached temperature
//! - `GET /temperature/history` - Last readings, oldest first
//! - `GET /temperature/range?start&end` - Readings in a window (defaults to today)
//! - `GET /temperature/average?start&end` - Mean over a window (defaults to today)
//! - `GET /humidity/...` - Same shapes for humidity
//! - `GET /readings/today` - Joined temperature/humidity series
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! ## WebSocket
//! - `GET /ws` - Live value changes
//!
//! # Example
//!
//! ```rust,ignore
//! use envwatch::api::{serve, AppState};
//!
//! let state = AppState::new(queries, cache, hub, config);
//! serve(state).await?;
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    http::{HeaderValue, Method},
    routing::get,
    Extension, Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::storage::MetricKind;
use crate::websocket::websocket_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config.api);

    // Create shared state
    let shared_state = Arc::new(state);

    Router::new()
        .nest("/temperature", metric_routes(MetricKind::Temperature))
        .nest("/humidity", metric_routes(MetricKind::Humidity))
        .route("/readings/today", get(routes::readings::today))
        .route("/ws", get(websocket_handler))
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

/// Routes served once per metric
fn metric_routes(metric: MetricKind) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(routes::readings::current))
        .route("/history", get(routes::readings::history))
        .route("/range", get(routes::readings::range))
        .route("/average", get(routes::readings::average))
        .layer(Extension(metric))
}

/// Permissive unless origins are configured
fn cors_layer(config: &ApiConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET])
}

/// Start the API server
pub async fn serve(state: AppState) -> Result<(), ApiError> {
    let addr = state.config.api.addr();
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("envwatch listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("envwatch API shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
