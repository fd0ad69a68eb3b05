use serde::{Serialize, Deserialize};
use crate::vecmath::Vec3;

/// A velocity line for rendering: starts at the agent's 3D position and points along
/// its UV velocity lifted into the XY plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VelocityVector {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// A snapshot of the population and summary metrics after a given tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Number of completed ticks when the snapshot was taken.
    pub step: u64,
    pub agent_count: u32,
    /// Mean |velocity| in UV units per tick.
    pub mean_speed: f64,
    /// Agents sitting exactly on a domain boundary.
    pub pinned_agents: u32,
    /// Mean number of neighbors within the steering radius.
    pub mean_neighbor_count: f64,
    #[serde(skip_serializing_if = "Option::is_none")] // Don't write "positions": null
    pub positions: Option<Vec<Vec3>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub velocity_vectors: Option<Vec<VelocityVector>>,
}
