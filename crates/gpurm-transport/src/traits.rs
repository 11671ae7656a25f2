//! Node manager client trait definitions

use async_trait::async_trait;
use gpurm_core::{GpurmResult, JobId, MetricsResult, NodeAddr};

use crate::wire::LaunchPayload;

/// Client for the remote job control protocol spoken by node managers
///
/// Every method is a single request/response exchange with one node. Errors
/// are reported as `GpurmError::Transport` naming the job and node.
#[async_trait]
pub trait NodeManagerClient: Send + Sync {
    /// Ask the node to start the job's process on one local GPU
    async fn launch(&self, node: &NodeAddr, payload: &LaunchPayload) -> GpurmResult<()>;

    /// Ask the node to stop the job's process
    async fn terminate(&self, node: &NodeAddr, job_id: JobId) -> GpurmResult<()>;

    /// Fetch the job's current progress counters
    async fn fetch_metrics(&self, node: &NodeAddr, job_id: JobId) -> GpurmResult<MetricsResult>;

    /// Get the client name
    fn name(&self) -> &'static str;
}
