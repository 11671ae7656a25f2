//! In-memory node manager client for tests

use async_trait::async_trait;
use gpurm_core::{GpurmError, GpurmResult, JobId, MetricsResult, NodeAddr};
use gpurm_transport::{LaunchPayload, NodeManagerClient};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// A call received by the mock
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Launch { node: String, payload: LaunchPayload },
    Terminate { node: String, job_id: JobId },
    FetchMetrics { node: String, job_id: JobId },
}

/// Records calls and answers from canned metrics
#[derive(Default)]
pub struct MockNodeClient {
    unreachable: HashSet<String>,
    slow: HashMap<String, Duration>,
    metrics: Mutex<HashMap<JobId, MetricsResult>>,
    calls: Mutex<Vec<Call>>,
}

impl MockNodeClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every call to `host`
    pub fn with_unreachable(mut self, host: &str) -> Self {
        self.unreachable.insert(host.to_string());
        self
    }

    /// Delay every call to `host`
    pub fn with_slow(mut self, host: &str, delay: Duration) -> Self {
        self.slow.insert(host.to_string(), delay);
        self
    }

    /// Metrics returned for a job from now on
    pub fn set_metrics(&self, job_id: JobId, metrics: MetricsResult) {
        self.metrics.lock().unwrap().insert(job_id, metrics);
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn answer(&self, node: &NodeAddr, job_id: JobId, call: Call) -> GpurmResult<()> {
        self.calls.lock().unwrap().push(call);

        if let Some(delay) = self.slow.get(&node.host) {
            tokio::time::sleep(*delay).await;
        }
        if self.unreachable.contains(&node.host) {
            return Err(GpurmError::transport(job_id, node, "connection refused"));
        }
        Ok(())
    }
}

#[async_trait]
impl NodeManagerClient for MockNodeClient {
    async fn launch(&self, node: &NodeAddr, payload: &LaunchPayload) -> GpurmResult<()> {
        let call = Call::Launch {
            node: node.to_string(),
            payload: payload.clone(),
        };
        self.answer(node, payload.job_id, call).await
    }

    async fn terminate(&self, node: &NodeAddr, job_id: JobId) -> GpurmResult<()> {
        let call = Call::Terminate {
            node: node.to_string(),
            job_id,
        };
        self.answer(node, job_id, call).await
    }

    async fn fetch_metrics(&self, node: &NodeAddr, job_id: JobId) -> GpurmResult<MetricsResult> {
        let call = Call::FetchMetrics {
            node: node.to_string(),
            job_id,
        };
        self.answer(node, job_id, call).await?;

        Ok(self
            .metrics
            .lock()
            .unwrap()
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
