//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.
//!
//! The sampling period is not configurable; see [`crate::poller::SAMPLE_INTERVAL`].

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Reading store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("envwatch").join("readings.db").to_string_lossy().to_string())
        .unwrap_or_else(|| "./envwatch_data/readings.db".to_string())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

impl StorageConfig {
    /// Database path with a leading `~/` expanded to the home directory
    pub fn resolved_path(&self) -> PathBuf {
        match (self.database_path.strip_prefix("~/"), dirs::home_dir()) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(&self.database_path),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Allowed CORS origins; empty means permissive
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum listeners per metric on the notification hub
    #[serde(default = "default_max_listeners")]
    pub max_listeners_per_metric: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_max_listeners() -> usize {
    1000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: Vec::new(),
            max_listeners_per_metric: default_max_listeners(),
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Which sensor source to poll
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Built-in deterministic drift, no hardware needed
    #[default]
    Simulated,
    /// External reader program printing temperature and humidity
    Command,
}

impl SensorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Simulated => "simulated",
            SensorKind::Command => "command",
        }
    }
}

/// Sensor source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    pub source: SensorKind,

    /// Reader program for the command source
    #[serde(default)]
    pub command: Option<String>,

    #[serde(default)]
    pub args: Vec<String>,

    /// Upper bound on one sensor read
    #[serde(default = "default_sensor_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_baseline_temperature")]
    pub baseline_temperature: f64,

    #[serde(default = "default_baseline_humidity")]
    pub baseline_humidity: f64,

    /// Simulated source only: fail every Nth read (0 = never)
    #[serde(default)]
    pub fail_every: u64,
}

fn default_sensor_timeout() -> u64 {
    1500
}

fn default_baseline_temperature() -> f64 {
    22.0
}

fn default_baseline_humidity() -> f64 {
    45.0
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            source: SensorKind::default(),
            command: None,
            args: Vec::new(),
            timeout_ms: default_sensor_timeout(),
            baseline_temperature: default_baseline_temperature(),
            baseline_humidity: default_baseline_humidity(),
            fail_every: 0,
        }
    }
}

/// Query defaults for the dashboard
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    #[serde(default = "default_today_interval")]
    pub today_interval_minutes: u32,
}

fn default_history_limit() -> usize {
    crate::query::DEFAULT_HISTORY_LIMIT
}

fn default_today_interval() -> u32 {
    crate::query::DEFAULT_TODAY_INTERVAL_MINUTES
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
            today_interval_minutes: default_today_interval(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("envwatch").join("config.toml")),
            Some(PathBuf::from("/etc/envwatch/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("ENVWATCH_DATABASE") {
            self.storage.database_path = path;
        }

        if let Some(host) = lookup("ENVWATCH_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("ENVWATCH_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        if let Some(command) = lookup("ENVWATCH_SENSOR_COMMAND") {
            self.sensor.source = SensorKind::Command;
            self.sensor.command = Some(command);
        }

        if let Some(level) = lookup("ENVWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("ENVWATCH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Envwatch Configuration
#
# Environment variables override these settings:
# - ENVWATCH_DATABASE
# - ENVWATCH_HOST
# - ENVWATCH_PORT
# - ENVWATCH_SENSOR_COMMAND (also switches the source to "command")
# - ENVWATCH_LOG_LEVEL
# - ENVWATCH_LOG_FORMAT

[storage]
# SQLite file holding all readings
database_path = "~/.local/share/envwatch/readings.db"

[api]
# HTTP server host
host = "0.0.0.0"

# HTTP server port
port = 3000

# Allowed CORS origins (empty = allow any)
cors_origins = []

# Maximum live listeners per metric
max_listeners_per_metric = 1000

[sensor]
# "simulated" or "command"
source = "simulated"

# Reader program for the command source; must print
# "<temperature> <humidity>" or {"temperature": .., "humidity": ..}
# command = "/usr/local/bin/read-dht22"
# args = ["--pin", "4"]

# Upper bound on one sensor read (ms). The sensor is sampled every 2 s.
timeout_ms = 1500

# Simulated source baselines
baseline_temperature = 22.0
baseline_humidity = 45.0

[dashboard]
# Readings returned by /temperature/history and /humidity/history
history_limit = 10

# Minute grid for /readings/today
today_interval_minutes = 15

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
