//! Per-job metrics reported each round

use crate::error::{GpurmError, GpurmResult};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Metrics for one job in one round
///
/// Node managers own the metric vocabulary, so keys other than the three
/// known ones are kept verbatim in `extra`. The known keys are read
/// leniently: numbers may arrive as numeric text, and `job_exit` may be a
/// boolean, a number or `"true"`/`"false"`. A known key holding anything
/// else makes the whole response malformed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsResult {
    /// Cumulative seconds of compute credited to the job
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub attained_service: Option<f64>,
    /// Seconds per training iteration
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_f64",
        skip_serializing_if = "Option::is_none"
    )]
    pub per_iter_time: Option<f64>,
    /// Present and true once the job has finished
    #[serde(
        default,
        deserialize_with = "deserialize_lenient_flag",
        skip_serializing_if = "Option::is_none"
    )]
    pub job_exit: Option<bool>,
    /// Node-defined metrics
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MetricsResult {
    /// Metrics emitted by the simulation engine
    pub fn simulated(attained_service: f64, per_iter_time: f64, job_exit: bool) -> Self {
        Self {
            attained_service: Some(attained_service),
            per_iter_time: Some(per_iter_time),
            job_exit: job_exit.then_some(true),
            extra: Map::new(),
        }
    }

    /// Decode the JSON blob returned by a node manager
    pub fn from_json(blob: &str) -> GpurmResult<Self> {
        let value: Value = serde_json::from_str(blob)?;
        if !value.is_object() {
            return Err(GpurmError::Serialization(format!(
                "metrics payload must be an object, got {}",
                value
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Whether the job reported that it has exited
    pub fn job_exited(&self) -> bool {
        self.job_exit == Some(true)
    }
}

fn deserialize_lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawNumber {
        Number(f64),
        Text(String),
    }

    match Option::<RawNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawNumber::Number(n)) => Ok(Some(n)),
        Some(RawNumber::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("expected a number, got {:?}", s))),
    }
}

fn deserialize_lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawFlag {
        Flag(bool),
        Number(f64),
        Text(String),
    }

    match Option::<RawFlag>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawFlag::Flag(b)) => Ok(Some(b)),
        Some(RawFlag::Number(n)) => Ok(Some(n != 0.0)),
        Some(RawFlag::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            _ => Err(de::Error::custom(format!("expected a flag, got {:?}", s))),
        },
    }
}
