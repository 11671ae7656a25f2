//! JSON payloads carried inside node manager requests
//!
//! Field casing follows what deployed node managers expect: launch requests
//! use `job_id`/`local_GPU_ID`, terminate and metrics requests use `Job_ID`.

use gpurm_core::{GpurmResult, JobDescription, JobId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Launch request for one device of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaunchPayload {
    pub job_id: JobId,
    #[serde(rename = "local_GPU_ID")]
    pub local_gpu_id: u32,
    pub launch_command: String,
    pub should_resume: Value,
}

impl LaunchPayload {
    /// Build the launch request for one device, requiring a launch command
    pub fn for_device(
        job_id: JobId,
        description: &JobDescription,
        local_gpu_id: u32,
    ) -> GpurmResult<Self> {
        Ok(Self {
            job_id,
            local_gpu_id,
            launch_command: description.require_launch_command(job_id)?.to_string(),
            should_resume: description.should_resume(),
        })
    }
}

/// Terminate and metrics request body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobIdPayload {
    #[serde(rename = "Job_ID")]
    pub job_id: JobId,
}

impl JobIdPayload {
    pub fn new(job_id: JobId) -> Self {
        Self { job_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpurm_core::GpurmError;
    use serde_json::json;

    #[test]
    fn test_launch_payload_wire_names() {
        let desc = JobDescription::live("python train.py");
        let payload = LaunchPayload::for_device(JobId(12), &desc, 3).unwrap();

        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            json!({
                "job_id": 12,
                "local_GPU_ID": 3,
                "launch_command": "python train.py",
                "should_resume": "0",
            })
        );
    }

    #[test]
    fn test_launch_payload_forwards_suspended_marker() {
        let mut desc = JobDescription::live("python train.py");
        desc.suspended = Some(json!(1));
        let payload = LaunchPayload::for_device(JobId(12), &desc, 0).unwrap();
        assert_eq!(payload.should_resume, json!(1));
    }

    #[test]
    fn test_launch_payload_requires_command() {
        let mut desc = JobDescription::live("unused");
        desc.launch_command = None;
        let err = LaunchPayload::for_device(JobId(5), &desc, 0).unwrap_err();
        assert!(matches!(err, GpurmError::ContractViolation(_)));
    }

    #[test]
    fn test_job_id_payload_wire_name() {
        let encoded = serde_json::to_string(&JobIdPayload::new(JobId(8))).unwrap();
        assert_eq!(encoded, r#"{"Job_ID":8}"#);
    }
}
