//! Health records built from diagnostic script output
//!
//! Provides:
//! - [`HealthRecord`]: one snapshot of device vitals, labelled and timestamped
//! - [`ScriptKind`]: the parser selected for each monitored script
//! - Field-count validation (values themselves are kept verbatim)

use crate::discovery::DeviceIdentity;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fields a vitals line must carry at minimum
pub const MIN_VITAL_FIELDS: usize = 5;

/// Names of the leading vitals fields, in script output order
pub const VITAL_FIELD_NAMES: [&str; MIN_VITAL_FIELDS] =
    ["temperature", "humidity", "voltage", "uptime", "free_memory"];

const FIELD_DELIMITER: char = ',';

/// Why script output could not become a record
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("script produced no output")]
    EmptyOutput,
    #[error("expected at least {expected} fields, found {found} in {raw:?}")]
    MalformedOutput {
        expected: usize,
        found: usize,
        raw: String,
    },
}

/// Named value from a script line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
    pub value: String,
}

/// Device vitals snapshot (matches the notifications API body)
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthRecord {
    device_label: String,
    device_identifier: String,
    timestamp: DateTime<Utc>,
    metrics: Vec<Metric>,
}

impl HealthRecord {
    pub fn device_label(&self) -> &str {
        &self.device_label
    }

    pub fn device_identifier(&self) -> &str {
        &self.device_identifier
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Metric values in output order
    pub fn values(&self) -> Vec<&str> {
        self.metrics.iter().map(|m| m.value.as_str()).collect()
    }

    pub fn metric(&self, name: &str) -> Option<&str> {
        self.metrics
            .iter()
            .find(|m| m.name == name)
            .map(|m| m.value.as_str())
    }
}

impl fmt::Display for HealthRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} @ {}:",
            self.device_label,
            self.device_identifier,
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
        )?;
        for metric in &self.metrics {
            write!(f, " {}={}", metric.name, metric.value)?;
        }
        Ok(())
    }
}

/// Parser attached to a monitored script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScriptKind {
    /// Comma-delimited vitals line: temperature,humidity,voltage,uptime,free_memory[,...]
    #[default]
    VitalStats,
}

impl ScriptKind {
    pub fn parse(&self, raw: &str, device: &DeviceIdentity) -> Result<HealthRecord, ParseError> {
        self.parse_at(raw, device, Utc::now())
    }

    pub fn parse_at(
        &self,
        raw: &str,
        device: &DeviceIdentity,
        timestamp: DateTime<Utc>,
    ) -> Result<HealthRecord, ParseError> {
        let metrics = match self {
            ScriptKind::VitalStats => parse_vital_stats(raw)?,
        };

        Ok(HealthRecord {
            device_label: device.label().to_string(),
            device_identifier: device.identifier().to_string(),
            timestamp,
            metrics,
        })
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptKind::VitalStats => f.write_str("vitals"),
        }
    }
}

fn parse_vital_stats(raw: &str) -> Result<Vec<Metric>, ParseError> {
    // scripts terminate their line with a newline
    let line = raw.trim();
    if line.is_empty() {
        return Err(ParseError::EmptyOutput);
    }

    let values: Vec<&str> = line.split(FIELD_DELIMITER).collect();
    if values.len() < MIN_VITAL_FIELDS {
        return Err(ParseError::MalformedOutput {
            expected: MIN_VITAL_FIELDS,
            found: values.len(),
            raw: line.to_string(),
        });
    }

    Ok(values
        .into_iter()
        .enumerate()
        .map(|(index, value)| Metric {
            name: VITAL_FIELD_NAMES
                .get(index)
                .map(|name| name.to_string())
                .unwrap_or_else(|| format!("extra_{}", index)),
            value: value.to_string(),
        })
        .collect())
}
