//! GPU-count scaling table for the Optimus policy

use gpurm_core::{GpurmError, GpurmResult, SimulationConfig};

/// Speedup per GPU count, index 0 is one GPU
pub const DEFAULT_SCALING_FACTORS: [f64; 9] = [5.0, 3.0, 1.4, 1.2, 1.1, 1.0, 1.0, 1.0, 1.0];

/// Upper bound for any scaling factor
pub const MAX_SCALING_FACTOR: f64 = 5.0;

/// Lookup from allocated GPU count to a throughput multiplier
///
/// Factors are in (0, 5] and never increase with GPU count.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingTable {
    factors: Vec<f64>,
}

impl ScalingTable {
    /// Create a table from per-GPU-count factors, validating the invariants
    pub fn new(factors: Vec<f64>) -> GpurmResult<Self> {
        if factors.is_empty() {
            return Err(GpurmError::Config(
                "scaling table needs at least one factor".to_string(),
            ));
        }

        for (i, factor) in factors.iter().enumerate() {
            if !factor.is_finite() || *factor <= 0.0 || *factor > MAX_SCALING_FACTOR {
                return Err(GpurmError::Config(format!(
                    "scaling factor for {} GPUs must be in (0, {}], got {}",
                    i + 1,
                    MAX_SCALING_FACTOR,
                    factor
                )));
            }
        }

        if let Some(i) = factors.windows(2).position(|pair| pair[1] > pair[0]) {
            return Err(GpurmError::Config(format!(
                "scaling factor for {} GPUs ({}) exceeds the factor for {} GPUs ({})",
                i + 2,
                factors[i + 1],
                i + 1,
                factors[i]
            )));
        }

        Ok(Self { factors })
    }

    /// Build the table from simulation configuration
    pub fn from_config(config: &SimulationConfig) -> GpurmResult<Self> {
        match &config.scaling_factors {
            Some(factors) => Self::new(factors.clone()),
            None => Ok(Self::default()),
        }
    }

    /// Largest GPU count with an entry
    pub fn max_gpus(&self) -> u32 {
        self.factors.len() as u32
    }

    /// Multiplier for the given GPU count
    pub fn multiplier(&self, gpus: u32) -> GpurmResult<f64> {
        gpus.checked_sub(1)
            .and_then(|i| self.factors.get(i as usize))
            .copied()
            .ok_or_else(|| {
                GpurmError::ContractViolation(format!(
                    "no scaling factor for {} GPUs (table covers 1-{})",
                    gpus,
                    self.max_gpus()
                ))
            })
    }
}

impl Default for ScalingTable {
    fn default() -> Self {
        Self {
            factors: DEFAULT_SCALING_FACTORS.to_vec(),
        }
    }
}
