//! Command sensor
//!
//! Runs an external reader program once per read and parses its stdout.
//! Accepted output:
//! - JSON: `{"temperature": 21.3, "humidity": 48.0}`
//! - Plain: `21.3 48.0` (temperature first, whitespace separated)

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;

use super::{SensorError, SensorSample, SensorSource};

pub struct CommandSensor {
    program: String,
    args: Vec<String>,
}

impl CommandSensor {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[derive(Deserialize)]
struct JsonOutput {
    temperature: f64,
    humidity: f64,
}

/// Parse the stdout of a reader program into a sample
pub fn parse_output(stdout: &str) -> Result<SensorSample, SensorError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(SensorError::InvalidOutput("empty output".to_string()));
    }

    let sample = if trimmed.starts_with('{') {
        let parsed: JsonOutput = serde_json::from_str(trimmed)
            .map_err(|e| SensorError::InvalidOutput(format!("bad JSON: {}", e)))?;
        SensorSample::new(parsed.temperature, parsed.humidity)
    } else {
        let mut fields = trimmed.split_whitespace();
        let mut next_number = |name: &str| -> Result<f64, SensorError> {
            let field = fields
                .next()
                .ok_or_else(|| SensorError::InvalidOutput(format!("missing {}", name)))?;
            field
                .parse::<f64>()
                .map_err(|e| SensorError::InvalidOutput(format!("{} '{}': {}", name, field, e)))
        };
        let temperature = next_number("temperature")?;
        let humidity = next_number("humidity")?;
        SensorSample::new(temperature, humidity)
    };

    if !sample.temperature.is_finite() || !sample.humidity.is_finite() {
        return Err(SensorError::InvalidOutput(format!(
            "non-finite values: {} / {}",
            sample.temperature, sample.humidity
        )));
    }

    Ok(sample)
}

#[async_trait]
impl SensorSource for CommandSensor {
    fn name(&self) -> &str {
        "command"
    }

    async fn read(&self) -> Result<SensorSample, SensorError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SensorError::ReadFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_output(&stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain() {
        let sample = parse_output("21.3 48.0\n").unwrap();
        assert_eq!(sample, SensorSample::new(21.3, 48.0));
    }

    #[test]
    fn test_parse_json() {
        let sample = parse_output(r#"{"temperature": 19.5, "humidity": 62.1}"#).unwrap();
        assert_eq!(sample, SensorSample::new(19.5, 62.1));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_output(""), Err(SensorError::InvalidOutput(_))));
        assert!(matches!(parse_output("21.3"), Err(SensorError::InvalidOutput(_))));
        assert!(matches!(parse_output("warm humid"), Err(SensorError::InvalidOutput(_))));
        assert!(matches!(parse_output("NaN 40.0"), Err(SensorError::InvalidOutput(_))));
        assert!(matches!(parse_output("{\"temperature\": 1}"), Err(SensorError::InvalidOutput(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_from_program() {
        let sensor = CommandSensor::new("echo", vec!["23.1".to_string(), "40.2".to_string()]);
        let sample = sensor.read().await.unwrap();
        assert_eq!(sample, SensorSample::new(23.1, 40.2));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_failing_program() {
        let sensor = CommandSensor::new("false", Vec::new());
        assert!(matches!(sensor.read().await, Err(SensorError::ReadFailed(_))));
    }

    #[tokio::test]
    async fn test_read_missing_program() {
        let sensor = CommandSensor::new("envwatch-no-such-reader-program", Vec::new());
        assert!(matches!(sensor.read().await, Err(SensorError::Io(_))));
    }
}
