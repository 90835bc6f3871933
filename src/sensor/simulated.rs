//! Simulated sensor
//!
//! Produces a slow, deterministic drift around two baselines. Values are
//! rounded to one decimal like a DHT22 reports them, so consecutive reads
//! frequently repeat.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{SensorError, SensorSample, SensorSource};

/// Number of reads in one full drift cycle (30 minutes at one read per 2 s)
const CYCLE_READS: f64 = 900.0;

pub struct SimulatedSensor {
    baseline_temperature: f64,
    baseline_humidity: f64,
    /// Fail every Nth read; 0 disables failures
    fail_every: u64,
    reads: AtomicU64,
}

impl SimulatedSensor {
    pub fn new(baseline_temperature: f64, baseline_humidity: f64, fail_every: u64) -> Self {
        Self {
            baseline_temperature,
            baseline_humidity,
            fail_every,
            reads: AtomicU64::new(0),
        }
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[async_trait]
impl SensorSource for SimulatedSensor {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn read(&self) -> Result<SensorSample, SensorError> {
        let n = self.reads.fetch_add(1, Ordering::Relaxed) + 1;

        if self.fail_every > 0 && n % self.fail_every == 0 {
            return Err(SensorError::ReadFailed(format!("simulated failure on read {}", n)));
        }

        let phase = (n as f64 / CYCLE_READS) * std::f64::consts::TAU;
        let temperature = round_one_decimal(self.baseline_temperature + 1.5 * phase.sin());
        let humidity = round_one_decimal(self.baseline_humidity - 4.0 * phase.sin());

        tracing::trace!(temperature, humidity, "[SIMULATED] Sensor read");
        Ok(SensorSample::new(temperature, humidity))
    }
}
