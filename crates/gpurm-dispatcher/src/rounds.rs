//! Round driver: owns the active job set across metrics rounds

use chrono::{DateTime, Utc};
use gpurm_core::{ActiveJobState, GpurmError, JobId, MetricsResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::arena::JobStateTable;
use crate::batch::{BatchReport, JobFailure, JobTarget, LaunchOutcome, LaunchRequest};
use crate::dispatcher::Dispatcher;

/// A job handed to the driver for admission
#[derive(Debug, Clone)]
pub struct Admission {
    pub request: LaunchRequest,
    /// Initial progress record, required for simulated jobs
    pub simulation: Option<ActiveJobState>,
}

impl Admission {
    pub fn live(request: LaunchRequest) -> Self {
        Self {
            request,
            simulation: None,
        }
    }

    pub fn simulated(request: LaunchRequest, state: ActiveJobState) -> Self {
        Self {
            request,
            simulation: Some(state),
        }
    }
}

/// Summary of one metrics round
#[derive(Debug)]
pub struct RoundSummary {
    /// Round number, starting at 1
    pub round: u64,
    pub completed_at: DateTime<Utc>,
    /// Metrics of every job that reported
    pub metrics: HashMap<JobId, MetricsResult>,
    /// Jobs that exited this round and were removed
    pub exited: Vec<JobId>,
    /// Jobs removed after a failure that no later round can clear
    pub retired: Vec<JobId>,
    /// Metrics and termination failures
    pub failures: Vec<JobFailure>,
}

/// Runs metrics rounds over the active job set
///
/// Jobs enter through `admit` and leave once they report `job_exit`, at
/// which point they are terminated and their simulation state dropped. A
/// job whose round fails with a non-retryable error leaves the same way.
pub struct RoundDriver {
    dispatcher: Dispatcher,
    table: JobStateTable,
    active: BTreeMap<JobId, JobTarget>,
    round_duration: f64,
    round: u64,
}

impl RoundDriver {
    /// Create a driver running rounds of `round_duration` seconds
    pub fn new(dispatcher: Dispatcher, round_duration: f64) -> Self {
        Self {
            dispatcher,
            table: JobStateTable::new(),
            active: BTreeMap::new(),
            round_duration,
            round: 0,
        }
    }

    /// Launch a batch of jobs and add the launched ones to the active set
    pub async fn admit(&mut self, jobs: Vec<Admission>) -> BatchReport<LaunchOutcome> {
        let mut report = BatchReport::new();
        let mut requests = Vec::new();
        let mut initial_states = HashMap::new();
        let mut seen = HashSet::new();

        for admission in jobs {
            let job_id = admission.request.job_id;

            if self.active.contains_key(&job_id) {
                report.record(
                    job_id,
                    Err(GpurmError::ContractViolation(format!(
                        "job {} is already active",
                        job_id
                    ))),
                );
                continue;
            }

            if !seen.insert(job_id) {
                report.record(
                    job_id,
                    Err(GpurmError::ContractViolation(format!(
                        "job {} appears more than once in the batch",
                        job_id
                    ))),
                );
                continue;
            }

            if admission.request.description.simulation {
                match admission.simulation {
                    Some(state) => {
                        if let Err(e) = self.dispatcher.validate_simulation(&state) {
                            report.record(job_id, Err(e));
                            continue;
                        }
                        initial_states.insert(job_id, state);
                    }
                    None => {
                        report.record(
                            job_id,
                            Err(GpurmError::ContractViolation(format!(
                                "simulated job {} has no simulation profile",
                                job_id
                            ))),
                        );
                        continue;
                    }
                }
            }

            requests.push(admission.request);
        }

        let targets: HashMap<JobId, JobTarget> = requests
            .iter()
            .map(|request| {
                let target = if request.description.simulation {
                    JobTarget::simulated(request.job_id)
                } else {
                    JobTarget::live(
                        request.job_id,
                        request.placement.primary_node().unwrap_or_default(),
                    )
                };
                (request.job_id, target)
            })
            .collect();

        let launched = self.dispatcher.launch_batch(requests).await;

        for (job_id, outcome) in launched.succeeded {
            if let Some(state) = initial_states.remove(&job_id) {
                if let Err(e) = self.table.insert(job_id, state) {
                    report.record(job_id, Err(e));
                    continue;
                }
            }
            if let Some(target) = targets.get(&job_id) {
                self.active.insert(job_id, target.clone());
            }
            debug!(job_id = %job_id, "Job admitted");
            report.record(job_id, Ok(outcome));
        }
        report.failed.extend(launched.failed);

        info!(
            admitted = report.succeeded.len(),
            rejected = report.failed.len(),
            active = self.active.len(),
            "Admitted jobs"
        );

        report
    }

    /// Collect one round of metrics and retire exited jobs
    pub async fn run_round(&mut self) -> RoundSummary {
        self.round += 1;

        let targets: Vec<JobTarget> = self.active.values().cloned().collect();
        let collected = self
            .dispatcher
            .collect_metrics(targets, self.round_duration, &mut self.table)
            .await;

        for (job_id, metrics) in &collected.succeeded {
            if let Some(state) = self.table.get_mut(*job_id) {
                state.record_metrics(metrics);
            }
        }

        let mut exited: Vec<JobId> = collected
            .succeeded
            .iter()
            .filter(|(_, metrics)| metrics.job_exited())
            .map(|(job_id, _)| *job_id)
            .collect();
        exited.sort();

        // Retrying only repeats the same error, so these jobs leave now
        let mut retired: Vec<JobId> = collected
            .failed
            .iter()
            .filter(|failure| !failure.error.is_retryable())
            .map(|failure| failure.job_id)
            .filter(|job_id| self.active.contains_key(job_id))
            .collect();
        retired.sort();
        retired.dedup();

        let finished: Vec<JobTarget> = exited
            .iter()
            .chain(&retired)
            .filter_map(|job_id| self.active.get(job_id).cloned())
            .collect();
        let terminated = self.dispatcher.terminate_batch(finished).await;

        for job_id in exited.iter().chain(&retired) {
            if let Some(target) = self.active.remove(job_id) {
                if target.simulated && self.table.contains(*job_id) {
                    if let Err(e) = self.table.remove(*job_id) {
                        warn!(job_id = %job_id, error = %e, "Failed to drop simulation state");
                    }
                }
            }
        }
        for job_id in &exited {
            info!(job_id = %job_id, round = self.round, "Job exited");
        }
        for job_id in &retired {
            warn!(
                job_id = %job_id,
                round = self.round,
                "Job retired after unrecoverable failure"
            );
        }

        let mut failures = collected.failed;
        failures.extend(terminated.failed);

        info!(
            round = self.round,
            reported = collected.succeeded.len(),
            exited = exited.len(),
            retired = retired.len(),
            failures = failures.len(),
            active = self.active.len(),
            "Round complete"
        );

        RoundSummary {
            round: self.round,
            completed_at: Utc::now(),
            metrics: collected.succeeded,
            exited,
            retired,
            failures,
        }
    }

    /// Whether no job is active
    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }

    /// Whether any active job runs on a real node
    pub fn has_live_jobs(&self) -> bool {
        self.active.values().any(|target| !target.simulated)
    }

    /// IDs of active jobs
    pub fn active_jobs(&self) -> Vec<JobId> {
        self.active.keys().copied().collect()
    }

    /// Simulation state of an active job
    pub fn job_state(&self, job_id: JobId) -> Option<&ActiveJobState> {
        self.table.get(job_id)
    }

    /// Number of rounds run so far
    pub fn round(&self) -> u64 {
        self.round
    }

    /// Length of one round in seconds
    pub fn round_duration(&self) -> f64 {
        self.round_duration
    }
}
