//! Resource manager dispatcher

use futures::future::join_all;
use gpurm_core::{
    ActiveJobState, GpurmError, GpurmResult, JobId, ManagerConfig, MetricsResult, NodeAddr,
    SchedulingPolicy, TransportConfig,
};
use gpurm_transport::{LaunchPayload, NodeManagerClient};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::arena::JobStateTable;
use crate::batch::{BatchReport, JobTarget, LaunchOutcome, LaunchRequest, TerminateOutcome};
use crate::engine::SimulationEngine;
use crate::scaling::ScalingTable;

/// Drives launch, terminate and metrics calls across a batch of jobs
///
/// Live jobs go to their node managers through the client; simulated jobs
/// are advanced in-process by the simulation engine.
pub struct Dispatcher {
    /// Node manager client
    client: Arc<dyn NodeManagerClient>,
    /// Progress model for simulated jobs
    engine: SimulationEngine,
    /// Port every node manager listens on
    node_manager_port: u16,
    /// Bound on each remote call
    call_timeout: Duration,
}

impl Dispatcher {
    /// Create a new dispatcher
    pub fn new(
        client: Arc<dyn NodeManagerClient>,
        policy: SchedulingPolicy,
        scaling: ScalingTable,
        transport: &TransportConfig,
    ) -> Self {
        info!(
            client = client.name(),
            policy = %policy,
            node_manager_port = transport.node_manager_port,
            "Dispatcher initialized"
        );

        Self {
            client,
            engine: SimulationEngine::new(policy, scaling),
            node_manager_port: transport.node_manager_port,
            call_timeout: transport.call_timeout(),
        }
    }

    /// Create a dispatcher from the manager configuration
    pub fn from_config(
        client: Arc<dyn NodeManagerClient>,
        config: &ManagerConfig,
    ) -> GpurmResult<Self> {
        let scaling = ScalingTable::from_config(&config.simulation)?;
        Ok(Self::new(
            client,
            config.policy.name,
            scaling,
            &config.transport,
        ))
    }

    /// Override the per-call timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Active scheduling policy
    pub fn policy(&self) -> SchedulingPolicy {
        self.engine.policy()
    }

    /// Check that a simulated job's state can be advanced under the policy
    pub fn validate_simulation(&self, state: &ActiveJobState) -> GpurmResult<()> {
        self.engine.validate(state).map(|_| ())
    }

    fn node_addr(&self, host: &str) -> NodeAddr {
        NodeAddr::new(host, self.node_manager_port)
    }

    /// Run one remote call under the per-call timeout
    async fn call<T, F>(&self, job_id: JobId, node: &NodeAddr, call: F) -> GpurmResult<T>
    where
        F: Future<Output = GpurmResult<T>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GpurmError::transport(
                job_id,
                node,
                format!("timed out after {:?}", self.call_timeout),
            )),
        }
    }

    /// Launch a batch of jobs
    ///
    /// Jobs are launched concurrently and a failing job never affects the
    /// others. A job ID seen earlier in the batch is rejected without any
    /// remote call.
    pub async fn launch_batch(&self, jobs: Vec<LaunchRequest>) -> BatchReport<LaunchOutcome> {
        info!(jobs = jobs.len(), "Launching batch");

        let mut seen = HashSet::new();
        let (unique, repeated): (Vec<&LaunchRequest>, Vec<&LaunchRequest>) =
            jobs.iter().partition(|request| seen.insert(request.job_id));

        let results = join_all(
            unique
                .into_iter()
                .map(|request| async move { (request.job_id, self.launch_job(request).await) }),
        )
        .await;

        let mut report: BatchReport<LaunchOutcome> = results.into_iter().collect();
        for request in repeated {
            report.record(
                request.job_id,
                Err(GpurmError::ContractViolation(format!(
                    "job {} appears more than once in the batch",
                    request.job_id
                ))),
            );
        }
        for failure in &report.failed {
            warn!(
                job_id = %failure.job_id,
                error = %failure.error,
                "Failed to launch job"
            );
        }

        report
    }

    /// Launch one job on every device of its placement
    ///
    /// Device calls run concurrently and are all awaited. The job counts as
    /// launched only if every device acknowledged.
    async fn launch_job(&self, request: &LaunchRequest) -> GpurmResult<LaunchOutcome> {
        let job_id = request.job_id;

        if request.description.simulation {
            // TODO: account for checkpoint and restore time once the simulator models it
            debug!(job_id = %job_id, "Simulated job, skipping launch");
            return Ok(LaunchOutcome::Simulated);
        }

        // Validate everything before the first remote call
        let devices = request.placement.devices(job_id)?;
        let payloads = devices
            .iter()
            .map(|device| {
                LaunchPayload::for_device(job_id, &request.description, device.local_gpu_id)
            })
            .collect::<GpurmResult<Vec<_>>>()?;

        let results = join_all(devices.iter().zip(&payloads).map(|(device, payload)| async move {
            let node = self.node_addr(&device.node);
            let result = self.call(job_id, &node, self.client.launch(&node, payload)).await;
            (device.clone(), result)
        }))
        .await;

        let mut launched = Vec::new();
        let mut failed = Vec::new();
        let mut first_error = None;

        for (device, result) in results {
            match result {
                Ok(()) => {
                    debug!(job_id = %job_id, device = %device, "Device launched");
                    launched.push(device);
                }
                Err(e) => {
                    failed.push((device, e.to_string()));
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        match first_error {
            None => {
                info!(job_id = %job_id, devices = launched.len(), "Launched job");
                Ok(LaunchOutcome::Launched { devices: launched })
            }
            Some(error) if launched.is_empty() => Err(error),
            Some(_) => Err(GpurmError::PartialLaunch {
                job_id,
                launched,
                failed,
            }),
        }
    }

    /// Terminate a batch of jobs
    ///
    /// Each job's own simulation flag decides whether a remote call is made.
    pub async fn terminate_batch(&self, jobs: Vec<JobTarget>) -> BatchReport<TerminateOutcome> {
        info!(jobs = jobs.len(), "Terminating batch");

        let results = join_all(
            jobs.iter()
                .map(|target| async move { (target.job_id, self.terminate_job(target).await) }),
        )
        .await;

        let report: BatchReport<TerminateOutcome> = results.into_iter().collect();
        for failure in &report.failed {
            warn!(
                job_id = %failure.job_id,
                error = %failure.error,
                "Failed to terminate job"
            );
        }

        report
    }

    async fn terminate_job(&self, target: &JobTarget) -> GpurmResult<TerminateOutcome> {
        if target.simulated {
            return Ok(TerminateOutcome::Simulated);
        }

        let node = self.node_addr(&target.node);
        self.call(target.job_id, &node, self.client.terminate(&node, target.job_id))
            .await?;

        debug!(job_id = %target.job_id, node = %node, "Terminated job");
        Ok(TerminateOutcome::Terminated)
    }

    /// Collect one round of metrics
    ///
    /// Live jobs are fetched from their nodes, every call a fresh fetch.
    /// Simulated jobs are checked out of `table`, advanced by
    /// `round_duration` seconds, and checked back in with the new state.
    pub async fn collect_metrics(
        &self,
        jobs: Vec<JobTarget>,
        round_duration: f64,
        table: &mut JobStateTable,
    ) -> BatchReport<MetricsResult> {
        let mut report = BatchReport::new();
        let (simulated, live): (Vec<JobTarget>, Vec<JobTarget>) =
            jobs.into_iter().partition(|target| target.simulated);

        debug!(
            live = live.len(),
            simulated = simulated.len(),
            round_duration = round_duration,
            "Collecting metrics"
        );

        let fetches = join_all(
            live.iter()
                .map(|target| async move { (target.job_id, self.fetch_live(target).await) }),
        );

        // Check out every simulated entry before advancing any, so a job
        // listed twice cannot be advanced twice.
        let mut leases = Vec::with_capacity(simulated.len());
        for target in &simulated {
            match table.checkout(target.job_id) {
                Ok(lease) => leases.push(lease),
                Err(e) => report.record(target.job_id, Err(e)),
            }
        }

        for mut lease in leases {
            let job_id = lease.job_id();
            let outcome = self
                .engine
                .advance(lease.state(), round_duration)
                .map(|step| {
                    lease.replace(step.state);
                    step.metrics
                });
            let committed = table.checkin(lease);
            report.record(job_id, committed.and(outcome));
        }

        for (job_id, result) in fetches.await {
            report.record(job_id, result);
        }

        for failure in &report.failed {
            warn!(
                job_id = %failure.job_id,
                error = %failure.error,
                "Failed to collect metrics"
            );
        }

        report
    }

    async fn fetch_live(&self, target: &JobTarget) -> GpurmResult<MetricsResult> {
        let node = self.node_addr(&target.node);
        let metrics = self
            .call(target.job_id, &node, self.client.fetch_metrics(&node, target.job_id))
            .await?;

        debug!(job_id = %target.job_id, node = %node, "Fetched metrics");
        Ok(metrics)
    }
}
