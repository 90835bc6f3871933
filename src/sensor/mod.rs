//! Sensor Sources
//!
//! The poller reads temperature and humidity through the [`SensorSource`]
//! trait without knowing where the values come from:
//! - Simulated (deterministic drift, no hardware needed)
//! - Command (external reader program, e.g. a DHT22 helper on a Raspberry Pi)
//!
//! Reads are expected to fail now and then. The poller logs the failure and
//! tries again on the next tick.

mod command;
mod simulated;

pub use command::{parse_output, CommandSensor};
pub use simulated::SimulatedSensor;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::{SensorConfig, SensorKind};

/// Common trait for all sensor sources
#[async_trait]
pub trait SensorSource: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Take one temperature/humidity measurement
    async fn read(&self) -> Result<SensorSample, SensorError>;
}

/// One successful measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    /// Degrees Celsius
    pub temperature: f64,
    /// Relative humidity, percent
    pub humidity: f64,
}

impl SensorSample {
    pub fn new(temperature: f64, humidity: f64) -> Self {
        Self {
            temperature,
            humidity,
        }
    }
}

/// Errors that can occur while reading the sensor
#[derive(Debug, thiserror::Error)]
pub enum SensorError {
    #[error("Sensor read failed: {0}")]
    ReadFailed(String),

    #[error("Invalid sensor output: {0}")]
    InvalidOutput(String),

    #[error("Sensor read timed out after {0} ms")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the sensor source selected in the configuration
pub fn build_sensor(config: &SensorConfig) -> Result<Arc<dyn SensorSource>, SensorError> {
    match config.source {
        SensorKind::Simulated => {
            tracing::info!("Using simulated sensor (no hardware access)");
            Ok(Arc::new(SimulatedSensor::new(
                config.baseline_temperature,
                config.baseline_humidity,
                config.fail_every,
            )))
        }
        SensorKind::Command => {
            let program = config.command.clone().ok_or_else(|| {
                SensorError::ReadFailed("sensor.command must be set for the command source".into())
            })?;
            tracing::info!(program = %program, args = ?config.args, "Using command sensor");
            Ok(Arc::new(CommandSensor::new(program, config.args.clone())))
        }
    }
}
