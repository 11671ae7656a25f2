//! Batch file of jobs handed to the daemon

use gpurm_core::{ActiveJobState, GpurmError, GpurmResult, JobDescription, JobId, Placement};
use gpurm_dispatcher::{Admission, JobFailure, LaunchRequest};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

/// Jobs to admit, as written by the allocator
#[derive(Debug, Deserialize)]
pub struct BatchFile {
    pub jobs: Vec<BatchJob>,
}

/// One job entry of a batch file
#[derive(Debug, Deserialize)]
pub struct BatchJob {
    pub job_id: JobId,
    /// Untyped submission record, validated on admission
    pub description: Value,
    #[serde(default)]
    pub placement: Placement,
    /// Initial progress record for simulated jobs
    #[serde(default)]
    pub simulation_profile: Option<ActiveJobState>,
}

impl BatchFile {
    /// Load a batch from a JSON file
    pub fn from_file(path: &Path) -> GpurmResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Validate every entry, splitting admissions from rejected jobs
    pub fn into_admissions(self) -> (Vec<Admission>, Vec<JobFailure>) {
        let mut admissions = Vec::new();
        let mut rejected = Vec::new();

        for job in self.jobs {
            match JobDescription::from_value(job.description) {
                Ok(description) => admissions.push(Admission {
                    request: LaunchRequest::new(job.job_id, description, job.placement),
                    simulation: job.simulation_profile,
                }),
                Err(error) => rejected.push(JobFailure {
                    job_id: job.job_id,
                    error,
                }),
            }
        }

        (admissions, rejected)
    }
}

impl std::str::FromStr for BatchFile {
    type Err = GpurmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(serde_json::from_str(s)?)
    }
}
