//! gpurm-dispatcher: Resource manager dispatcher
//!
//! This crate drives job lifecycle across node managers:
//! - Batch launch, terminate and metrics collection
//! - In-process simulation of job progress
//! - GPU-count scaling for the Optimus policy
//! - Per-job state arena and the round driver

pub mod arena;
pub mod batch;
pub mod dispatcher;
pub mod engine;
pub mod rounds;
pub mod scaling;

#[cfg(test)]
mod testing;

pub use arena::{JobStateTable, Lease};
pub use batch::{
    BatchReport, JobFailure, JobTarget, LaunchOutcome, LaunchRequest, TerminateOutcome,
};
pub use dispatcher::Dispatcher;
pub use engine::{SimulationEngine, SimulationStep};
pub use rounds::{Admission, RoundDriver, RoundSummary};
pub use scaling::ScalingTable;
