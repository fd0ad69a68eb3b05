use crate::config::{FieldSampling, NeighborSearch};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Relative strength of each steering influence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteeringWeights {
    pub curvature: f64,
    pub slope: f64,
    pub separation: f64,
    pub cohesion: f64,
    pub alignment: f64,
}

impl Default for SteeringWeights {
    fn default() -> Self {
        SteeringWeights {
            curvature: 1.0,
            slope: 1.0,
            separation: 10.0,
            cohesion: 10.0,
            alignment: 1.0,
        }
    }
}

impl SteeringWeights {
    /// Weights that switch every force off.
    pub fn zero() -> Self {
        SteeringWeights { curvature: 0.0, slope: 0.0, separation: 0.0, cohesion: 0.0, alignment: 0.0 }
    }

    fn all_finite(&self) -> bool {
        [self.curvature, self.slope, self.separation, self.cohesion, self.alignment]
            .iter()
            .all(|w| w.is_finite())
    }
}

/// Per-tick parameters handed to `step()`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepParams {
    /// Neighborhood radius in UV units (strict `<`).
    pub radius: f64,
    pub weights: SteeringWeights,
    /// Upper bound on |velocity| after steering.
    pub max_speed: f64,
    pub neighbor_search: NeighborSearch,
    pub field_sampling: FieldSampling,
    /// When false, only field forces apply (no neighbor interaction).
    pub flocking: bool,
}

impl Default for StepParams {
    fn default() -> Self {
        StepParams {
            radius: 0.05,
            weights: SteeringWeights::default(),
            max_speed: 0.003,
            neighbor_search: NeighborSearch::default(),
            field_sampling: FieldSampling::default(),
            flocking: true,
        }
    }
}

impl StepParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_speed.is_finite() && self.max_speed > 0.0) {
            anyhow::bail!("max_speed must be positive and finite (got {}).", self.max_speed);
        }
        if !(self.radius.is_finite() && self.radius >= 0.0) {
            anyhow::bail!("neighbor radius must be finite and non-negative (got {}).", self.radius);
        }
        if !self.weights.all_finite() {
            anyhow::bail!("steering weights must be finite: {:?}", self.weights);
        }
        Ok(())
    }
}

/// Simulation parameters derived from the configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    pub field_resolution: (usize, usize),
    pub agent_count: usize,
    pub seed: u64,
    pub initial_speed: f64,
    pub step: StepParams,
}
