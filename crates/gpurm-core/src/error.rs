//! Error types for gpurm

use crate::model::{DeviceSlot, JobId};
use thiserror::Error;

/// Main error type for gpurm
#[derive(Error, Debug)]
pub enum GpurmError {
    /// A caller broke the contract of an operation (missing field, bad placement)
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// A single remote call to a node manager failed
    #[error("Transport error for job {job_id} on {node}: {reason}")]
    Transport {
        job_id: JobId,
        node: String,
        reason: String,
    },

    /// Some, but not all, devices of a job received the launch command
    #[error(
        "Partial launch of job {job_id}: {} devices launched, {} failed",
        .launched.len(),
        .failed.len()
    )]
    PartialLaunch {
        job_id: JobId,
        launched: Vec<DeviceSlot>,
        failed: Vec<(DeviceSlot, String)>,
    },

    /// Metrics requested for a simulated job that has no state entry
    #[error("Simulation state missing for job {0}")]
    SimulationStateMissing(JobId),

    /// The job's state entry is already checked out for this round
    #[error("Simulation state for job {0} is already checked out")]
    StateCheckedOut(JobId),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GpurmError {
    /// Build a transport error for a (job, node) pair
    pub fn transport(job_id: JobId, node: impl ToString, reason: impl ToString) -> Self {
        GpurmError::Transport {
            job_id,
            node: node.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller may retry the operation that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GpurmError::Transport { .. } | GpurmError::PartialLaunch { .. }
        )
    }
}

/// Result type for gpurm operations
pub type GpurmResult<T> = Result<T, GpurmError>;

impl From<serde_json::Error> for GpurmError {
    fn from(err: serde_json::Error) -> Self {
        GpurmError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for GpurmError {
    fn from(err: toml::de::Error) -> Self {
        GpurmError::Config(err.to_string())
    }
}
