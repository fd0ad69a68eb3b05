use crate::agent::Agent;
use crate::field::{FieldDiagnostics, FieldGrid};
use crate::grid::NeighborQuery;
use crate::population::Population;
use crate::spawner::build_population;
use crate::surface::{Axis, HeightfieldSurface, Interval, Surface};
use anyhow::Result;
use log::{debug, info, trace};
use rand::prelude::*;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use surface_common::{SimulationConfig, Snapshot, StepParams, Vec3, VelocityVector};

/// Default per-component bound on the random initial velocity.
pub const DEFAULT_INITIAL_SPEED: f64 = 0.01;

/// What optional per-agent data goes into recorded snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotOptions {
    pub positions: bool,
    pub velocity_vectors: bool,
}

/// Caller-owned simulation handle: surface, precomputed field and population.
///
/// Every tick is a pure function of the previous population. The handle keeps no state
/// between ticks beyond the population and tick counter, so a caller may stop, resume
/// or `reset` between any two `step` calls.
pub struct Simulation {
    surface: Arc<dyn Surface>,
    field: FieldGrid,
    diagnostics: FieldDiagnostics,
    population: Population,
    domain_u: Interval,
    domain_v: Interval,
    /// Seed of the current population; also keys the per-agent random streams.
    seed: u64,
    initial_speed: f64,
    tick: u64,
    snapshot_options: SnapshotOptions,
    recorded_snapshots: Vec<Snapshot>,
}

impl Simulation {
    /// Samples the field on a `field_resolution` grid and spawns `n` agents from `seed`.
    pub fn initialize(
        n: usize,
        surface: Arc<dyn Surface>,
        field_resolution: (usize, usize),
        seed: u64,
    ) -> Result<Self> {
        Self::initialize_with_speed(n, surface, field_resolution, seed, DEFAULT_INITIAL_SPEED)
    }

    pub fn initialize_with_speed(
        n: usize,
        surface: Arc<dyn Surface>,
        field_resolution: (usize, usize),
        seed: u64,
        initial_speed: f64,
    ) -> Result<Self> {
        let (domain_u, domain_v) = checked_domain(surface.as_ref())?;
        let (nu, nv) = field_resolution;
        let (field, diagnostics) = FieldGrid::build(surface.as_ref(), nu, nv)?;
        let population = build_population(n, domain_u, domain_v, seed, initial_speed, surface.as_ref())?;

        info!("Simulation initialized: {} agents, {}x{} field, seed {}.", n, nu, nv, seed);
        Ok(Simulation {
            surface,
            field,
            diagnostics,
            population,
            domain_u,
            domain_v,
            seed,
            initial_speed,
            tick: 0,
            snapshot_options: SnapshotOptions::default(),
            recorded_snapshots: Vec::new(),
        })
    }

    /// Builds the heightfield surface, field and population described by `config`.
    pub fn from_config(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        let params = config.get_sim_params();
        let surface: Arc<dyn Surface> = Arc::new(HeightfieldSurface::from_config(&config.surface)?);
        let mut sim = Self::initialize_with_speed(
            params.agent_count,
            surface,
            params.field_resolution,
            params.seed,
            params.initial_speed,
        )?;
        sim.snapshot_options = SnapshotOptions {
            positions: config.output.save_positions_in_snapshot,
            velocity_vectors: config.output.save_vectors_in_snapshot,
        };
        Ok(sim)
    }

    /// Uses an explicit population instead of a seeded one (for scripted scenarios).
    pub fn with_population(
        surface: Arc<dyn Surface>,
        field: FieldGrid,
        population: Population,
        seed: u64,
    ) -> Result<Self> {
        let (domain_u, domain_v) = checked_domain(surface.as_ref())?;
        if population.is_empty() {
            anyhow::bail!("Population must contain at least one agent.");
        }
        if field.domain() != (domain_u, domain_v) {
            anyhow::bail!(
                "Field domain {:?} does not match surface domain {:?}.",
                field.domain(),
                (domain_u, domain_v)
            );
        }
        Ok(Simulation {
            surface,
            field,
            diagnostics: FieldDiagnostics::default(),
            population,
            domain_u,
            domain_v,
            seed,
            initial_speed: DEFAULT_INITIAL_SPEED,
            tick: 0,
            snapshot_options: SnapshotOptions::default(),
            recorded_snapshots: Vec::new(),
        })
    }

    pub fn set_snapshot_options(&mut self, options: SnapshotOptions) {
        self.snapshot_options = options;
    }

    /// Replaces the population with a fresh one drawn from `seed`; the field is kept.
    pub fn reset(&mut self, seed: u64) -> Result<()> {
        let n = self.population.len();
        self.population = build_population(
            n,
            self.domain_u,
            self.domain_v,
            seed,
            self.initial_speed,
            self.surface.as_ref(),
        )?;
        self.seed = seed;
        self.tick = 0;
        self.recorded_snapshots.clear();
        info!("Simulation reset with seed {}.", seed);
        Ok(())
    }

    /// Advances the population by one synchronous tick.
    ///
    /// Phase 1 computes every agent's new velocity in parallel against the unmodified
    /// population. Phase 2 commits the velocities and advances all agents.
    pub fn step(&mut self, params: &StepParams) -> Result<()> {
        params.validate()?;
        let started = Instant::now();

        // --- 1. Compute (read-only snapshot) ---
        {
            let field = &self.field;
            let seed = self.seed;
            let tick = self.tick;
            let Population { agents, next_velocities } = &mut self.population;
            let agents: &[Agent] = agents;
            let query = params.flocking.then(|| {
                NeighborQuery::new(params.neighbor_search, agents, self.domain_u, self.domain_v, params.radius)
            });

            (0..agents.len())
                .into_par_iter()
                .map(|idx| {
                    let mut rng = StdRng::seed_from_u64(agent_stream_seed(seed, idx, tick));
                    let agent = &agents[idx];
                    match &query {
                        Some(query) => {
                            let neighbors: Vec<&Agent> = query
                                .neighbors_of(agents, idx)
                                .into_iter()
                                .map(|n| &agents[n])
                                .collect();
                            agent.steered_velocity(field, Some(neighbors.as_slice()), params, &mut rng)
                        }
                        None => agent.steered_velocity(field, None, params, &mut rng),
                    }
                })
                .collect_into_vec(next_velocities);
        }

        // --- 2. Commit ---
        self.population.commit(self.surface.as_ref());
        self.tick += 1;

        trace!(
            "Tick {} completed in {:.3} ms.",
            self.tick,
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(())
    }

    /// 3D positions of all agents.
    pub fn positions(&self) -> Vec<Vec3> {
        self.population.positions()
    }

    /// `(origin, direction)` velocity lines of all agents.
    pub fn velocity_vectors(&self) -> Vec<VelocityVector> {
        self.population.velocity_vectors()
    }

    pub fn population(&self) -> &Population {
        &self.population
    }

    pub fn agent_count(&self) -> usize {
        self.population.len()
    }

    pub fn field(&self) -> &FieldGrid {
        &self.field
    }

    pub fn diagnostics(&self) -> &FieldDiagnostics {
        &self.diagnostics
    }

    pub fn surface(&self) -> &dyn Surface {
        self.surface.as_ref()
    }

    /// Number of completed ticks since initialization or the last reset.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Neighbor count of every agent under the given radius.
    fn calculate_neighbor_counts_parallel(&self, params: &StepParams) -> Vec<usize> {
        let agents = self.population.agents();
        let query = NeighborQuery::new(params.neighbor_search, agents, self.domain_u, self.domain_v, params.radius);
        (0..agents.len())
            .into_par_iter()
            .map(|idx| query.neighbors_of(agents, idx).len())
            .collect()
    }

    /// Collects summary metrics for the current population and stores them.
    pub fn record_snapshot(&mut self, params: &StepParams) -> Result<()> {
        params.validate()?;
        let n = self.population.len();
        let surface = self.surface.as_ref();

        let mean_speed = self.population.iter().map(|a| a.velocity().length()).sum::<f64>() / n as f64;
        let pinned_agents = self.population.iter().filter(|a| a.is_pinned(surface)).count() as u32;

        let neighbor_counts = self.calculate_neighbor_counts_parallel(params);
        let mean_neighbor_count = neighbor_counts.iter().sum::<usize>() as f64 / n as f64;
        debug!(
            "Snapshot at tick {}: mean_speed={:.5}, pinned={}, mean_neighbors={:.2}",
            self.tick, mean_speed, pinned_agents, mean_neighbor_count
        );

        let snapshot = Snapshot {
            step: self.tick,
            agent_count: n as u32,
            mean_speed,
            pinned_agents,
            mean_neighbor_count,
            positions: self.snapshot_options.positions.then(|| self.positions()),
            velocity_vectors: self.snapshot_options.velocity_vectors.then(|| self.velocity_vectors()),
        };
        self.recorded_snapshots.push(snapshot);
        Ok(())
    }

    pub fn get_recorded_snapshots(&self) -> &Vec<Snapshot> {
        &self.recorded_snapshots
    }
}

/// Independent random stream per agent and tick, so parallel steering stays reproducible.
fn agent_stream_seed(seed: u64, idx: usize, tick: u64) -> u64 {
    seed.wrapping_add((idx as u64).wrapping_mul(0x1F3A))
        .wrapping_add(tick.wrapping_mul(0x58C7))
}

fn checked_domain(surface: &dyn Surface) -> Result<(Interval, Interval)> {
    let (domain_u, domain_v) = (surface.domain(Axis::U), surface.domain(Axis::V));
    if !domain_u.is_valid() || !domain_v.is_valid() {
        anyhow::bail!("Surface domain has zero area: u={:?} v={:?}.", domain_u, domain_v);
    }
    Ok((domain_u, domain_v))
}
