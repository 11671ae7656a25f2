//! gpurm-core: Core types for the gpurm resource manager
//!
//! This crate provides the fundamental types used throughout gpurm:
//! - Job descriptions, placements and node addresses
//! - Simulated job state and per-round metrics
//! - Scheduling policy and configuration types
//! - Error handling

pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod policy;
pub mod state;

pub use config::*;
pub use error::*;
pub use metrics::*;
pub use model::*;
pub use policy::*;
pub use state::*;
