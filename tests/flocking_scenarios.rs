use std::sync::Arc;
use surface_agents::{Agent, FieldGrid, HeightfieldSurface, Interval, Population, Simulation, Surface, UvGrid};
use surface_common::{NeighborSearch, SimulationConfig, SteeringWeights, StepParams, Vec2, Vec3};

const CONFIG: &str = r#"
[surface]
size = 10.0
amplitude = 1.5
frequency = 3.0

[field]
resolution_u = 24
resolution_v = 24

[agents]
count = 200
seed = 42

[steering]
radius = 0.08
max_speed = 0.01

[timing]
total_steps = 50
record_interval_steps = 10

[output]
base_filename = "scenario"
save_positions = false
save_stats = false
"#;

/// Flat surface with a field that exerts no force and no damping.
fn still_world(agents: &[(f64, f64)], seed: u64) -> Simulation {
    let surface: Arc<dyn Surface> = Arc::new(HeightfieldSurface::flat(1.0).unwrap());
    let grid = UvGrid::uniform(4, 4, Interval::unit(), Interval::unit()).unwrap();
    let field = FieldGrid::from_parts(grid, vec![0.0; 16], vec![0.0; 16], vec![Vec3::ZERO; 16]).unwrap();
    let agents = agents
        .iter()
        .map(|&(u, v)| Agent::new(Vec2::new(u, v), Vec2::ZERO, surface.as_ref()))
        .collect();
    Simulation::with_population(surface, field, Population::new(agents), seed).unwrap()
}

fn separation_only(separation: f64, radius: f64, max_speed: f64) -> StepParams {
    StepParams {
        radius,
        weights: SteeringWeights { separation, ..SteeringWeights::zero() },
        max_speed,
        ..StepParams::default()
    }
}

fn uv_of(sim: &Simulation) -> Vec<Vec2> {
    sim.population().iter().map(Agent::uv).collect()
}

#[test]
fn close_pair_separates_with_linear_weight() {
    let mut sim = still_world(&[(0.10, 0.10), (0.12, 0.10)], 0);
    sim.step(&separation_only(0.01, 0.05, 1.0)).unwrap();

    let agents = sim.population().agents();
    // Weight 1 - 0.02 / 0.05 = 0.6 along the A-B axis, scaled by the separation weight.
    assert!((agents[0].velocity().x + 0.006).abs() < 1e-9, "{:?}", agents[0].velocity());
    assert!((agents[1].velocity().x - 0.006).abs() < 1e-9, "{:?}", agents[1].velocity());
    assert_eq!(agents[0].velocity().y, 0.0);
    assert!((agents[0].distance_to(&agents[1]) - 0.032).abs() < 1e-9);
}

#[test]
fn coincident_agents_split_reproducibly() {
    let params = separation_only(0.01, 0.05, 1.0);
    let run = || {
        let mut sim = still_world(&[(0.5, 0.5), (0.5, 0.5)], 1234);
        sim.step(&params).unwrap();
        uv_of(&sim)
    };
    let first = run();
    assert!(first[0].distance(first[1]) > 0.0);
    assert!(first.iter().all(|uv| uv.is_finite()));
    assert_eq!(first, run());
}

#[test]
fn symmetric_pair_gets_opposite_velocities() {
    let mut sim = still_world(&[(0.45, 0.5), (0.55, 0.5)], 0);
    sim.step(&separation_only(1.0, 0.15, 1.0)).unwrap();
    let agents = sim.population().agents();
    assert_eq!(agents[0].velocity(), -agents[1].velocity());
    assert!(agents[0].velocity().x < 0.0);
}

#[test]
fn update_is_independent_of_agent_order() {
    let params = separation_only(1.0, 0.15, 0.02);
    let mut forward = still_world(&[(0.30, 0.40), (0.38, 0.45)], 0);
    let mut reversed = still_world(&[(0.38, 0.45), (0.30, 0.40)], 0);
    for _ in 0..3 {
        forward.step(&params).unwrap();
        reversed.step(&params).unwrap();
    }
    let mut a = uv_of(&forward);
    a.reverse();
    assert_eq!(a, uv_of(&reversed));
}

#[test]
fn configured_run_respects_domain_and_speed_cap() {
    let config = SimulationConfig::from_toml_str(CONFIG).unwrap();
    let params = config.get_sim_params();
    let mut sim = Simulation::from_config(&config).unwrap();
    assert_eq!(sim.agent_count(), 200);
    assert_eq!(sim.field().dimensions(), (24, 24));

    for _ in 0..config.timing.total_steps {
        sim.step(&params.step).unwrap();
        for agent in sim.population() {
            let uv = agent.uv();
            assert!((0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y));
            assert!(agent.velocity().length() <= params.step.max_speed);
        }
    }
    assert_eq!(sim.tick(), 50);
    assert_eq!(sim.positions().len(), 200);
    assert_eq!(sim.velocity_vectors().len(), 200);
}

#[test]
fn bilinear_sampling_runs_deterministically() {
    let config = SimulationConfig::from_toml_str(&CONFIG.replace(
        "resolution_v = 24",
        "resolution_v = 24\nsampling = \"bilinear\"",
    ))
    .unwrap();
    let params = config.get_sim_params();
    let run = || {
        let mut sim = Simulation::from_config(&config).unwrap();
        for _ in 0..10 {
            sim.step(&params.step).unwrap();
        }
        uv_of(&sim)
    };
    assert_eq!(run(), run());
}

#[test]
fn naive_and_grid_search_produce_identical_runs() {
    let surface: Arc<dyn Surface> = Arc::new(HeightfieldSurface::new(5.0, 0.5, 4.0, 0.1, 20).unwrap());
    let naive = StepParams { neighbor_search: NeighborSearch::Naive, radius: 0.07, ..StepParams::default() };
    let grid = StepParams { neighbor_search: NeighborSearch::Grid, ..naive };

    let mut a = Simulation::initialize(250, surface.clone(), (20, 20), 77).unwrap();
    let mut b = Simulation::initialize(250, surface, (20, 20), 77).unwrap();
    for _ in 0..15 {
        a.step(&naive).unwrap();
        b.step(&grid).unwrap();
    }
    assert_eq!(a.population().agents(), b.population().agents());
}

#[test]
fn invalid_configurations_are_rejected() {
    assert!(SimulationConfig::from_toml_str(&CONFIG.replace("resolution_u = 24", "resolution_u = 0")).is_err());
    assert!(SimulationConfig::from_toml_str(&CONFIG.replace("max_speed = 0.01", "max_speed = 0.0")).is_err());
    assert!(SimulationConfig::from_toml_str(&CONFIG.replace("count = 200", "count = 0")).is_err());

    let mut sim = still_world(&[(0.5, 0.5)], 0);
    assert!(sim.step(&StepParams { max_speed: -1.0, ..StepParams::default() }).is_err());
    assert!(sim.step(&StepParams { radius: f64::NAN, ..StepParams::default() }).is_err());
}

#[test]
fn reset_between_ticks_replays_the_same_run() {
    let surface: Arc<dyn Surface> = Arc::new(HeightfieldSurface::new(10.0, 1.0, 2.0, 0.0, 20).unwrap());
    let params = StepParams::default();
    let mut sim = Simulation::initialize(60, surface, (16, 16), 9).unwrap();
    for _ in 0..8 {
        sim.step(&params).unwrap();
    }
    let after_eight = uv_of(&sim);

    sim.reset(9).unwrap();
    for _ in 0..8 {
        sim.step(&params).unwrap();
    }
    assert_eq!(uv_of(&sim), after_eight);
}
