//! envwatch server
//!
//! Run with: cargo run -- --config envwatch.toml
//!
//! # Configuration
//!
//! Settings come from a TOML file (see `--print-config`), then environment:
//! - `ENVWATCH_DATABASE`: SQLite database path
//! - `ENVWATCH_HOST` / `ENVWATCH_PORT`: Address to bind to (default: 0.0.0.0:3000)
//! - `ENVWATCH_SENSOR_COMMAND`: Reader program; switches to the command sensor
//! - `ENVWATCH_LOG_LEVEL` / `ENVWATCH_LOG_FORMAT`: Logging
//! - `RUST_LOG`: Log filter, takes precedence over the configured level

use anyhow::Context;
use clap::Parser;
use envwatch::api::{serve, AppState};
use envwatch::config::{generate_default_config, Config, LoggingConfig};
use envwatch::notify::{HubConfig, NotificationHub};
use envwatch::poller::{Poller, ReadingCache};
use envwatch::query::QueryService;
use envwatch::sensor::build_sensor;
use envwatch::storage::ReadingStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "envwatch", version, about = "Temperature and humidity dashboard server")]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_tracing(&config.logging);

    tracing::info!("Starting envwatch v{}", env!("CARGO_PKG_VERSION"));

    let db_path = config.storage.resolved_path();
    tracing::info!("Database: {:?}", db_path);
    let store = ReadingStore::open(&db_path)
        .with_context(|| format!("opening reading store at {}", db_path.display()))?;

    let sensor = build_sensor(&config.sensor)?;
    tracing::info!(sensor = sensor.name(), "Sensor source ready");

    let cache = Arc::new(ReadingCache::new());
    let hub = Arc::new(NotificationHub::new(HubConfig {
        max_listeners_per_metric: config.api.max_listeners_per_metric,
    }));

    let poller = Arc::new(Poller::new(
        sensor,
        store.clone(),
        Arc::clone(&cache),
        Arc::clone(&hub),
        Duration::from_millis(config.sensor.timeout_ms),
    ));
    let poller_handle = poller.start();

    let queries = QueryService::new(
        store,
        Arc::clone(&cache),
        config.dashboard.history_limit,
        config.dashboard.today_interval_minutes,
    );
    let state = AppState::new(queries, cache, hub, config);

    let result = serve(state).await;

    poller_handle.abort();
    tracing::info!("envwatch stopped");

    result.context("API server failed")
}

/// Install the global subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("envwatch={},tower_http=info", logging.level).into());

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
