//! Agents that roam the UV domain of a parametric surface, steered by curvature and
//! slope fields sampled from the surface and by boid rules among nearby agents.

pub mod agent;
pub mod field;
pub mod grid;
pub mod population;
pub mod simulation;
pub mod spawner;
pub mod surface;

pub use agent::Agent;
pub use field::{sample_uniform_grid, FieldDiagnostics, FieldGrid, SurfaceSamples, UvGrid};
pub use grid::{neighbors_in_radius, NeighborGrid, NeighborQuery};
pub use population::Population;
pub use simulation::{Simulation, SnapshotOptions};
pub use spawner::{build_population, build_population_at};
pub use surface::{domain_of, Axis, HeightfieldSurface, Interval, Surface};
