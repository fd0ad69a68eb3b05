pub mod config;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{
    AgentsConfig, FieldConfig, FieldSampling, NeighborSearch, OutputConfig, SimulationConfig,
    SteeringConfig, SurfaceConfig, TimingConfig,
};
pub use sim_params::{SimParams, StepParams, SteeringWeights};
pub use snapshot::{Snapshot, VelocityVector};
pub use vecmath::{clamp, Vec2, Vec3};
