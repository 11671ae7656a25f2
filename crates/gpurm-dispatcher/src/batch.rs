//! Batch requests and per-job results

use gpurm_core::{DeviceSlot, GpurmError, GpurmResult, JobDescription, JobId, Placement};
use std::collections::HashMap;

/// Launch request for one job
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub job_id: JobId,
    pub description: JobDescription,
    pub placement: Placement,
}

impl LaunchRequest {
    pub fn new(job_id: JobId, description: JobDescription, placement: Placement) -> Self {
        Self {
            job_id,
            description,
            placement,
        }
    }
}

/// A job addressed for terminate or metrics calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTarget {
    pub job_id: JobId,
    /// Node that answers for the job
    pub node: String,
    /// Whether the job is simulated, checked per job
    pub simulated: bool,
}

impl JobTarget {
    pub fn live(job_id: JobId, node: impl Into<String>) -> Self {
        Self {
            job_id,
            node: node.into(),
            simulated: false,
        }
    }

    pub fn simulated(job_id: JobId) -> Self {
        Self {
            job_id,
            node: String::new(),
            simulated: true,
        }
    }
}

/// Result of launching one job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchOutcome {
    /// Every device of the job acknowledged the launch
    Launched { devices: Vec<DeviceSlot> },
    /// Simulated job, nothing was sent
    Simulated,
}

/// Result of terminating one job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminateOutcome {
    Terminated,
    /// Simulated job, nothing was sent
    Simulated,
}

/// A job that failed within a batch
#[derive(Debug)]
pub struct JobFailure {
    pub job_id: JobId,
    pub error: GpurmError,
}

/// Outcome of a batch operation: successes by job ID plus failures
#[derive(Debug)]
pub struct BatchReport<T> {
    pub succeeded: HashMap<JobId, T>,
    pub failed: Vec<JobFailure>,
}

impl<T> BatchReport<T> {
    pub fn new() -> Self {
        Self {
            succeeded: HashMap::new(),
            failed: Vec::new(),
        }
    }

    /// Record one job's result
    pub fn record(&mut self, job_id: JobId, result: GpurmResult<T>) {
        match result {
            Ok(value) => {
                self.succeeded.insert(job_id, value);
            }
            Err(error) => self.failed.push(JobFailure { job_id, error }),
        }
    }

    /// Successful result for a job
    pub fn get(&self, job_id: JobId) -> Option<&T> {
        self.succeeded.get(&job_id)
    }

    /// Error recorded for a job
    pub fn failure(&self, job_id: JobId) -> Option<&GpurmError> {
        self.failed
            .iter()
            .find(|f| f.job_id == job_id)
            .map(|f| &f.error)
    }

    /// Whether every job in the batch succeeded
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// IDs of failed jobs whose errors allow a retry
    pub fn retryable(&self) -> Vec<JobId> {
        self.failed
            .iter()
            .filter(|f| f.error.is_retryable())
            .map(|f| f.job_id)
            .collect()
    }
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(JobId, GpurmResult<T>)> for BatchReport<T> {
    fn from_iter<I: IntoIterator<Item = (JobId, GpurmResult<T>)>>(iter: I) -> Self {
        let mut report = Self::new();
        for (job_id, result) in iter {
            report.record(job_id, result);
        }
        report
    }
}
