use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::{SimParams, StepParams, SteeringWeights};
use std::path::Path;

// Parameters of the procedural heightfield surface the agents live on
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SurfaceConfig {
    pub size: f64,
    pub amplitude: f64,
    pub frequency: f64,
    #[serde(default)]
    pub phase: f64,
    // Control-grid resolution used to place the surface's lowest point at z = 0
    #[serde(default = "default_surface_resolution")]
    pub resolution: usize,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldSampling {
    /// Truncating nearest-cell lookup.
    #[default]
    Nearest,
    /// Bilinear interpolation between the four surrounding cells.
    Bilinear,
}

// Resolution of the precomputed curvature/slope field
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FieldConfig {
    pub resolution_u: usize,
    pub resolution_v: usize,
    #[serde(default)]
    pub sampling: FieldSampling,
}

// Initial population
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AgentsConfig {
    pub count: usize,
    pub seed: u64,
    #[serde(default = "default_initial_speed")]
    pub initial_speed: f64,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NeighborSearch {
    /// O(n) scan per agent.
    Naive,
    /// Uniform bucket grid over the UV domain.
    #[default]
    Grid,
}

// Steering weights and limits, applied every tick
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SteeringConfig {
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_unit_weight")]
    pub curvature_weight: f64,
    #[serde(default = "default_unit_weight")]
    pub slope_weight: f64,
    #[serde(default = "default_flock_weight")]
    pub separation_weight: f64,
    #[serde(default = "default_flock_weight")]
    pub cohesion_weight: f64,
    #[serde(default = "default_unit_weight")]
    pub alignment_weight: f64,
    #[serde(default = "default_max_speed")]
    pub max_speed: f64,
    #[serde(default)]
    pub neighbor_search: NeighborSearch,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub total_steps: u32,
    pub record_interval_steps: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_positions: bool,
    pub save_stats: bool,
    #[serde(default)]
    pub save_positions_in_snapshot: bool,
    #[serde(default)]
    pub save_vectors_in_snapshot: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulationConfig {
    pub surface: SurfaceConfig,
    pub field: FieldConfig,
    pub agents: AgentsConfig,
    #[serde(default)]
    pub steering: SteeringConfig,
    pub timing: TimingConfig,
    pub output: OutputConfig,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        SteeringConfig {
            radius: default_radius(),
            curvature_weight: default_unit_weight(),
            slope_weight: default_unit_weight(),
            separation_weight: default_flock_weight(),
            cohesion_weight: default_flock_weight(),
            alignment_weight: default_unit_weight(),
            max_speed: default_max_speed(),
            neighbor_search: NeighborSearch::default(),
        }
    }
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config = Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))?;

        Ok(config)
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that would make the simulation produce NaNs.
    pub fn validate(&self) -> Result<()> {
        if !(self.surface.size.is_finite() && self.surface.size > 0.0) {
            anyhow::bail!("surface.size must be positive.");
        }
        if !(self.surface.amplitude.is_finite()
            && self.surface.frequency.is_finite()
            && self.surface.phase.is_finite())
        {
            anyhow::bail!("surface amplitude, frequency and phase must be finite.");
        }
        if self.surface.resolution == 0 {
            anyhow::bail!("surface.resolution must be greater than 0.");
        }
        if self.field.resolution_u == 0 || self.field.resolution_v == 0 {
            anyhow::bail!("field resolution must be greater than 0 in both directions.");
        }
        if self.agents.count == 0 {
            anyhow::bail!("agents.count must be greater than 0.");
        }
        if !(self.agents.initial_speed.is_finite() && self.agents.initial_speed >= 0.0) {
            anyhow::bail!("agents.initial_speed must be finite and non-negative.");
        }
        self.get_sim_params().step.validate()?;
        Ok(())
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let steering = &self.steering;
        SimParams {
            field_resolution: (self.field.resolution_u, self.field.resolution_v),
            agent_count: self.agents.count,
            seed: self.agents.seed,
            initial_speed: self.agents.initial_speed,
            step: StepParams {
                radius: steering.radius,
                weights: SteeringWeights {
                    curvature: steering.curvature_weight,
                    slope: steering.slope_weight,
                    separation: steering.separation_weight,
                    cohesion: steering.cohesion_weight,
                    alignment: steering.alignment_weight,
                },
                max_speed: steering.max_speed,
                neighbor_search: steering.neighbor_search,
                field_sampling: self.field.sampling,
                flocking: true,
            },
        }
    }
}

fn default_surface_resolution() -> usize {
    20
}

fn default_initial_speed() -> f64 {
    0.01
}

fn default_radius() -> f64 {
    0.05
}

fn default_unit_weight() -> f64 {
    1.0
}

fn default_flock_weight() -> f64 {
    10.0
}

fn default_max_speed() -> f64 {
    0.003
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [surface]
        size = 10.0
        amplitude = 1.0
        frequency = 2.0

        [field]
        resolution_u = 40
        resolution_v = 30

        [agents]
        count = 100
        seed = 42

        [timing]
        total_steps = 10
        record_interval_steps = 5

        [output]
        base_filename = "run"
        save_positions = false
        save_stats = false
    "#;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = SimulationConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.surface.resolution, 20);
        assert_eq!(config.field.sampling, FieldSampling::Nearest);
        assert_eq!(config.steering.neighbor_search, NeighborSearch::Grid);

        let params = config.get_sim_params();
        assert_eq!(params.field_resolution, (40, 30));
        assert_eq!(params.step.radius, 0.05);
        assert_eq!(params.step.weights.separation, 10.0);
        assert_eq!(params.step.weights.alignment, 1.0);
        assert_eq!(params.step.max_speed, 0.003);
        assert_eq!(params.initial_speed, 0.01);
    }

    #[test]
    fn rejects_non_positive_max_speed() {
        let text = format!("{}\n[steering]\nmax_speed = 0.0\n", MINIMAL);
        assert!(SimulationConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn rejects_zero_field_resolution() {
        let text = MINIMAL.replace("resolution_u = 40", "resolution_u = 0");
        assert!(SimulationConfig::from_toml_str(&text).is_err());
    }

    #[test]
    fn parses_lowercase_enums() {
        let text = format!(
            "{}\n[steering]\nneighbor_search = \"naive\"\n",
            MINIMAL.replace("resolution_v = 30", "resolution_v = 30\nsampling = \"bilinear\"")
        );
        let config = SimulationConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.steering.neighbor_search, NeighborSearch::Naive);
        assert_eq!(config.field.sampling, FieldSampling::Bilinear);
    }
}
