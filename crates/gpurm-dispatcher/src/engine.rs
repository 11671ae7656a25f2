//! Simulation progress engine
//!
//! Advances a simulated job by one round without talking to any node. The
//! engine never mutates its input: it returns the next state together with
//! the metrics for the round and the caller decides whether to commit.

use gpurm_core::{ActiveJobState, GpurmError, GpurmResult, MetricsResult, SchedulingPolicy};
use tracing::debug;

use crate::scaling::ScalingTable;

/// Result of advancing one job by one round
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationStep {
    /// State to commit for the job
    pub state: ActiveJobState,
    /// Metrics reported for the round
    pub metrics: MetricsResult,
}

/// Deterministic progress model for simulated jobs
#[derive(Debug, Clone)]
pub struct SimulationEngine {
    policy: SchedulingPolicy,
    scaling: ScalingTable,
}

impl SimulationEngine {
    /// Create an engine for the given policy and scaling table
    pub fn new(policy: SchedulingPolicy, scaling: ScalingTable) -> Self {
        Self { policy, scaling }
    }

    /// Active scheduling policy
    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    /// Check that `state` can be advanced under this policy
    ///
    /// Returns the multiplier applied to each round's increment.
    pub fn validate(&self, state: &ActiveJobState) -> GpurmResult<f64> {
        if !state.job_iteration_time.is_finite() || state.job_iteration_time <= 0.0 {
            return Err(GpurmError::ContractViolation(format!(
                "iteration time must be positive, got {}",
                state.job_iteration_time
            )));
        }

        if self.policy.scales_by_gpu_count() {
            self.scaling.multiplier(state.total_gpus)
        } else {
            Ok(1.0)
        }
    }

    /// Advance `state` by one round of `round_duration` seconds
    pub fn advance(
        &self,
        state: &ActiveJobState,
        round_duration: f64,
    ) -> GpurmResult<SimulationStep> {
        if !round_duration.is_finite() || round_duration < 0.0 {
            return Err(GpurmError::ContractViolation(format!(
                "round duration must be a non-negative number of seconds, got {}",
                round_duration
            )));
        }
        let multiplier = self.validate(state)?;

        let mut next = state.clone();
        next.job_launched_first_time = !state.previously_launched;
        next.previously_launched = true;

        let iterations_this_round = round_duration / state.job_iteration_time;
        let attained_service = state.tracked_metrics.attained_service + round_duration;

        // Scaling applies to this round's increment only, never to history.
        let increment = iterations_this_round * multiplier;
        let total_iterations = increment + state.job_executed_iteration;
        let job_exit = total_iterations >= state.job_total_iteration;

        next.job_executed_iteration = total_iterations;

        debug!(
            policy = %self.policy,
            increment = increment,
            executed = total_iterations,
            target = state.job_total_iteration,
            job_exit = job_exit,
            "Advanced simulated job"
        );

        Ok(SimulationStep {
            state: next,
            metrics: MetricsResult::simulated(
                attained_service,
                state.job_iteration_time,
                job_exit,
            ),
        })
    }
}

impl Default for SimulationEngine {
    fn default() -> Self {
        Self::new(SchedulingPolicy::Fifo, ScalingTable::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpurm_core::{parse_gpu_count, JobPhase};

    fn fifo() -> SimulationEngine {
        SimulationEngine::default()
    }

    fn optimus() -> SimulationEngine {
        SimulationEngine::new(SchedulingPolicy::Optimus, ScalingTable::default())
    }

    #[test]
    fn test_exit_detected_when_target_reached() {
        let state = ActiveJobState::new(1.0, 10.0, 1);
        let step = fifo().advance(&state, 10.0).unwrap();

        assert_eq!(step.state.job_executed_iteration, 10.0);
        assert_eq!(step.metrics.job_exit, Some(true));
        assert_eq!(step.metrics.attained_service, Some(10.0));
        assert_eq!(step.metrics.per_iter_time, Some(1.0));
        assert_eq!(step.state.phase(), JobPhase::Exited);
    }

    #[test]
    fn test_running_job_omits_exit() {
        let state = ActiveJobState::new(2.0, 100.0, 1);
        let step = fifo().advance(&state, 10.0).unwrap();

        assert_eq!(step.state.job_executed_iteration, 5.0);
        assert_eq!(step.metrics.job_exit, None);
        assert_eq!(step.state.phase(), JobPhase::Running);
    }

    #[test]
    fn test_optimus_scales_only_the_increment() {
        let mut state = ActiveJobState::new(1.0, 1000.0, parse_gpu_count("2.0").unwrap());
        state.previously_launched = true;
        state.job_executed_iteration = 7.0;

        let step = optimus().advance(&state, 10.0).unwrap();
        // 10 iterations * factor 3, history added unscaled
        assert_eq!(step.state.job_executed_iteration, 37.0);
    }

    #[test]
    fn test_fifo_ignores_scaling_table() {
        let state = ActiveJobState::new(1.0, 1000.0, 2);
        let step = fifo().advance(&state, 10.0).unwrap();
        assert_eq!(step.state.job_executed_iteration, 10.0);
    }

    #[test]
    fn test_optimus_unknown_gpu_count() {
        let state = ActiveJobState::new(1.0, 1000.0, 12);
        let err = optimus().advance(&state, 10.0).unwrap_err();
        assert!(matches!(err, GpurmError::ContractViolation(_)));
    }

    #[test]
    fn test_validate_checks_scaling_only_under_optimus() {
        let state = ActiveJobState::new(1.0, 1000.0, 12);
        assert_eq!(fifo().validate(&state).unwrap(), 1.0);
        assert!(matches!(
            optimus().validate(&state),
            Err(GpurmError::ContractViolation(_))
        ));

        let state = ActiveJobState::new(1.0, 1000.0, 2);
        assert_eq!(optimus().validate(&state).unwrap(), 3.0);
        assert!(fifo().validate(&ActiveJobState::new(0.0, 10.0, 1)).is_err());
    }

    #[test]
    fn test_first_launch_flag_set_once() {
        let engine = fifo();
        let state = ActiveJobState::new(1.0, 1000.0, 1);

        let first = engine.advance(&state, 10.0).unwrap();
        assert!(first.state.job_launched_first_time);
        assert!(first.state.previously_launched);

        let second = engine.advance(&first.state, 10.0).unwrap();
        assert!(!second.state.job_launched_first_time);
        assert!(second.state.previously_launched);
    }

    #[test]
    fn test_input_state_untouched() {
        let state = ActiveJobState::new(1.0, 1000.0, 1);
        let before = state.clone();
        let _ = fifo().advance(&state, 10.0).unwrap();
        assert_eq!(state, before);
    }

    #[test]
    fn test_progress_never_decreases() {
        let engine = optimus();
        let mut state = ActiveJobState::new(3.0, 500.0, 4);
        let mut last_executed = state.job_executed_iteration;
        let mut last_service = state.tracked_metrics.attained_service;

        for _ in 0..20 {
            let step = engine.advance(&state, 30.0).unwrap();
            assert!(step.state.job_executed_iteration >= last_executed);
            let service = step.metrics.attained_service.unwrap();
            assert_eq!(service, last_service + 30.0);

            last_executed = step.state.job_executed_iteration;
            last_service = service;
            state = step.state;
            state.record_metrics(&step.metrics);
        }
    }

    #[test]
    fn test_rejects_invalid_inputs() {
        let engine = fifo();
        let state = ActiveJobState::new(0.0, 10.0, 1);
        assert!(engine.advance(&state, 10.0).is_err());

        let state = ActiveJobState::new(1.0, 10.0, 1);
        assert!(engine.advance(&state, -1.0).is_err());
        assert!(engine.advance(&state, f64::NAN).is_err());
    }
}
