//! Configuration types for gpurm

use crate::policy::SchedulingPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resource manager configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Scheduling policy configuration
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Node manager transport configuration
    #[serde(default)]
    pub transport: TransportConfig,
    /// Simulation configuration
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ManagerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, crate::GpurmError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::GpurmError::Config(format!("Failed to read config file: {}", e))
        })?;
        toml::from_str(&content)
            .map_err(|e| crate::GpurmError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Scheduling policy configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Active policy name ("FIFO" or "Optimus")
    #[serde(default)]
    pub name: SchedulingPolicy,
}

/// Node manager transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Port every node manager listens on
    pub node_manager_port: u16,
    /// Timeout for establishing a channel, in seconds
    pub connect_timeout_secs: u64,
    /// Timeout for a single remote call, in seconds
    pub call_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            node_manager_port: 50052,
            connect_timeout_secs: 5,
            call_timeout_secs: 30,
        }
    }
}

impl TransportConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

/// Simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Length of one scheduling round, in seconds
    pub round_duration_secs: f64,
    /// Override for the GPU-count scaling factors (index 0 is one GPU)
    pub scaling_factors: Option<Vec<f64>>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: 300.0,
            scaling_factors: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level or filter directive
    pub level: String,
    /// Log format (json or text)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}
