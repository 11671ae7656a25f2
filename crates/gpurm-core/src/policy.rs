//! Scheduling policy selector

use crate::error::GpurmError;
use serde::{Deserialize, Serialize};

/// Active scheduling policy of the resource manager
///
/// Only `Optimus` changes control-plane behaviour: simulated progress is
/// scaled by the GPU-count table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SchedulingPolicy {
    /// First-in first-out, no progress scaling
    #[default]
    #[serde(rename = "FIFO")]
    Fifo,
    /// GPU-count scaled incremental progress
    #[serde(rename = "Optimus")]
    Optimus,
}

impl SchedulingPolicy {
    /// Whether simulated progress is scaled by allocated GPU count
    pub fn scales_by_gpu_count(&self) -> bool {
        matches!(self, SchedulingPolicy::Optimus)
    }
}

impl std::fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulingPolicy::Fifo => write!(f, "FIFO"),
            SchedulingPolicy::Optimus => write!(f, "Optimus"),
        }
    }
}

impl std::str::FromStr for SchedulingPolicy {
    type Err = GpurmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fifo" => Ok(SchedulingPolicy::Fifo),
            "optimus" => Ok(SchedulingPolicy::Optimus),
            other => Err(GpurmError::Config(format!(
                "unknown scheduling policy: {}",
                other
            ))),
        }
    }
}
