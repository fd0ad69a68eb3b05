use crate::agent::Agent;
use crate::population::Population;
use crate::surface::{Interval, Surface};
use anyhow::Result;
use log::debug;
use rand::distr::Uniform;
use rand::prelude::*;
use surface_common::{Vec2, Vec3};

/// Places `n` agents uniformly at random in the domain rectangle.
///
/// Draws are sequential from a single generator seeded with `seed`, in the fixed order
/// `u, v, du, dv` per agent, so the same seed always yields the same population.
/// Initial velocities are uniform in `[-initial_speed, initial_speed]` per component.
pub fn build_population(
    n: usize,
    domain_u: Interval,
    domain_v: Interval,
    seed: u64,
    initial_speed: f64,
    surface: &dyn Surface,
) -> Result<Population> {
    if n == 0 {
        anyhow::bail!("Population size must be greater than 0.");
    }
    if !domain_u.is_valid() || !domain_v.is_valid() {
        anyhow::bail!("Spawn domain has zero area: u={:?} v={:?}.", domain_u, domain_v);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let u_dist = Uniform::new_inclusive(domain_u.lo, domain_u.hi)?;
    let v_dist = Uniform::new_inclusive(domain_v.lo, domain_v.hi)?;

    let mut agents = Vec::with_capacity(n);
    for _ in 0..n {
        let uv = Vec2::new(rng.sample(u_dist), rng.sample(v_dist));
        let velocity = initial_velocity(&mut rng, initial_speed)?;
        agents.push(Agent::new(uv, velocity, surface));
    }

    debug!("Spawned {} agents with seed {}.", n, seed);
    Ok(Population::new(agents))
}

/// Seeds one agent per 3D point, at the surface parameters closest to that point.
pub fn build_population_at(
    points: &[Vec3],
    surface: &dyn Surface,
    seed: u64,
    initial_speed: f64,
) -> Result<Population> {
    if points.is_empty() {
        anyhow::bail!("At least one seed point is required.");
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut agents = Vec::with_capacity(points.len());
    for point in points {
        let (u, v) = surface.closest_point(*point);
        let velocity = initial_velocity(&mut rng, initial_speed)?;
        agents.push(Agent::new(Vec2::new(u, v), velocity, surface));
    }
    Ok(Population::new(agents))
}

fn initial_velocity(rng: &mut StdRng, initial_speed: f64) -> Result<Vec2> {
    if !(initial_speed.is_finite() && initial_speed >= 0.0) {
        anyhow::bail!("Initial speed must be finite and non-negative (got {}).", initial_speed);
    }
    if initial_speed == 0.0 {
        return Ok(Vec2::ZERO);
    }
    let dist = Uniform::new_inclusive(-initial_speed, initial_speed)?;
    Ok(Vec2::new(rng.sample(dist), rng.sample(dist)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeightfieldSurface;

    #[test]
    fn same_seed_gives_identical_population() {
        let surface = HeightfieldSurface::new(10.0, 1.0, 2.0, 0.0, 16).unwrap();
        let a = build_population(50, Interval::unit(), Interval::unit(), 42, 0.01, &surface).unwrap();
        let b = build_population(50, Interval::unit(), Interval::unit(), 42, 0.01, &surface).unwrap();
        assert_eq!(a.agents(), b.agents());

        let c = build_population(50, Interval::unit(), Interval::unit(), 43, 0.01, &surface).unwrap();
        assert_ne!(a.agents(), c.agents());
    }

    #[test]
    fn spawned_agents_lie_inside_domain_with_small_velocities() {
        let surface = HeightfieldSurface::flat(1.0).unwrap();
        let domain_u = Interval::new(0.25, 0.5);
        let pop = build_population(200, domain_u, Interval::unit(), 3, 0.01, &surface).unwrap();
        assert_eq!(pop.len(), 200);
        for agent in &pop {
            assert!(domain_u.contains(agent.uv().x));
            assert!(Interval::unit().contains(agent.uv().y));
            assert!(agent.velocity().x.abs() <= 0.01 && agent.velocity().y.abs() <= 0.01);
        }
    }

    #[test]
    fn invalid_requests_are_rejected() {
        let surface = HeightfieldSurface::flat(1.0).unwrap();
        assert!(build_population(0, Interval::unit(), Interval::unit(), 1, 0.01, &surface).is_err());
        assert!(build_population(5, Interval::new(0.5, 0.5), Interval::unit(), 1, 0.01, &surface).is_err());
        assert!(build_population(5, Interval::unit(), Interval::unit(), 1, -1.0, &surface).is_err());
    }

    #[test]
    fn seed_points_are_projected_onto_the_surface() {
        let surface = HeightfieldSurface::flat(4.0).unwrap();
        let points = [Vec3::new(1.0, 2.0, 5.0), Vec3::new(8.0, -1.0, 0.0)];
        let pop = build_population_at(&points, &surface, 9, 0.0).unwrap();
        assert_eq!(pop.agents()[0].uv(), Vec2::new(0.25, 0.5));
        assert_eq!(pop.agents()[1].uv(), Vec2::new(1.0, 0.0));
        assert_eq!(pop.agents()[0].velocity(), Vec2::ZERO);
    }
}
