//! Simulated job state tracked across rounds

use crate::error::{GpurmError, GpurmResult};
use crate::metrics::MetricsResult;
use serde::{Deserialize, Deserializer, Serialize};

/// Progress record for one simulated job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveJobState {
    /// Whether the job has been through at least one round
    #[serde(default)]
    pub previously_launched: bool,
    /// True only for the round in which the job first ran
    #[serde(default)]
    pub job_launched_first_time: bool,
    /// Seconds per iteration
    pub job_iteration_time: f64,
    /// Cumulative iterations executed
    #[serde(default)]
    pub job_executed_iteration: f64,
    /// Iteration count at which the job exits
    pub job_total_iteration: f64,
    /// GPUs allocated to the job, key into the scaling table
    #[serde(deserialize_with = "deserialize_gpu_count")]
    pub total_gpus: u32,
    /// Metrics folded back from previous rounds
    #[serde(default)]
    pub tracked_metrics: TrackedMetrics,
}

/// Metrics the caller folds back into the job state after each round
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackedMetrics {
    /// Cumulative seconds of compute consumed
    #[serde(default)]
    pub attained_service: f64,
    /// Last reported seconds per iteration
    #[serde(default)]
    pub per_iter_time: f64,
}

/// Lifecycle phase of a simulated job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    NeverLaunched,
    Running,
    Exited,
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobPhase::NeverLaunched => write!(f, "NeverLaunched"),
            JobPhase::Running => write!(f, "Running"),
            JobPhase::Exited => write!(f, "Exited"),
        }
    }
}

impl ActiveJobState {
    /// Create state for a job that has not run yet
    pub fn new(job_iteration_time: f64, job_total_iteration: f64, total_gpus: u32) -> Self {
        Self {
            previously_launched: false,
            job_launched_first_time: false,
            job_iteration_time,
            job_executed_iteration: 0.0,
            job_total_iteration,
            total_gpus,
            tracked_metrics: TrackedMetrics::default(),
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> JobPhase {
        if !self.previously_launched {
            JobPhase::NeverLaunched
        } else if self.job_executed_iteration >= self.job_total_iteration {
            JobPhase::Exited
        } else {
            JobPhase::Running
        }
    }

    /// Fold a round's metrics into the tracked values
    pub fn record_metrics(&mut self, metrics: &MetricsResult) {
        if let Some(attained) = metrics.attained_service {
            self.tracked_metrics.attained_service = attained;
        }
        if let Some(per_iter) = metrics.per_iter_time {
            self.tracked_metrics.per_iter_time = per_iter;
        }
    }
}

/// Parse a GPU count written as `"2"` or `"2.0"`
pub fn parse_gpu_count(raw: &str) -> GpurmResult<u32> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|_| GpurmError::ContractViolation(format!("invalid GPU count: {:?}", raw)))?;
    gpu_count_from_f64(value)
}

fn gpu_count_from_f64(value: f64) -> GpurmResult<u32> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
        return Err(GpurmError::ContractViolation(format!(
            "invalid GPU count: {}",
            value
        )));
    }
    Ok(value as u32)
}

fn deserialize_gpu_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawGpuCount {
        Int(u64),
        Float(f64),
        Text(String),
    }

    let parsed = match RawGpuCount::deserialize(deserializer)? {
        RawGpuCount::Int(n) => u32::try_from(n)
            .map_err(|_| GpurmError::ContractViolation(format!("invalid GPU count: {}", n))),
        RawGpuCount::Float(f) => gpu_count_from_f64(f),
        RawGpuCount::Text(s) => parse_gpu_count(&s),
    };
    parsed.map_err(serde::de::Error::custom)
}
