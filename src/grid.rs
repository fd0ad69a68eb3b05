use crate::agent::Agent;
use crate::surface::Interval;
use surface_common::{NeighborSearch, Vec2};

/// Cap on buckets per axis; larger radii-to-domain ratios just get coarser cells.
const MAX_CELLS_PER_AXIS: usize = 1024;
/// Buckets per axis allowed for each `sqrt(agent count)`, keeping total cells O(n).
const CELLS_PER_SQRT_AGENT: usize = 2;
/// Keeps cells strictly wider than the radius under rounding.
const CELL_SHRINK: f64 = 1.0 - 1e-9;

/// Neighbor inclusion predicate shared by every search strategy: strict `<` on UV distance.
#[inline(always)]
pub fn within_radius(a: Vec2, b: Vec2, radius: f64) -> bool {
    a.distance(b) < radius
}

/// Reference O(n) scan: every other agent strictly closer than `radius`.
///
/// The agent at `self_idx` is skipped by index, so it is excluded even from a coincident position.
pub fn neighbors_in_radius(agents: &[Agent], self_idx: usize, radius: f64) -> Vec<usize> {
    let Some(center) = agents.get(self_idx).map(Agent::uv) else {
        return Vec::new();
    };
    agents
        .iter()
        .enumerate()
        .filter(|&(idx, other)| idx != self_idx && within_radius(center, other.uv(), radius))
        .map(|(idx, _)| idx)
        .collect()
}

/// Uniform bucket grid over the UV domain, rebuilt from a population snapshot.
///
/// Agents are counting-sorted by cell (`cell_counts` / `cell_starts` / `cell_agent_indices`)
/// and a query scans the 3x3 block of cells around the agent. Cells are at least `radius`
/// wide, so no neighbor can be missed.
#[derive(Debug, Clone)]
pub struct NeighborGrid {
    domain_u: Interval,
    domain_v: Interval,
    radius: f64,
    inv_cell_size: (f64, f64),
    grid_dim_x: usize,
    grid_dim_y: usize,
    agent_cells: Vec<usize>,
    cell_counts: Vec<usize>,
    cell_starts: Vec<usize>,
    cell_agent_indices: Vec<usize>,
}

impl NeighborGrid {
    pub fn build(agents: &[Agent], domain_u: Interval, domain_v: Interval, radius: f64) -> Self {
        // Coarser cells never miss a neighbor, so tiny radii need no more cells than agents.
        let max_per_axis = ((agents.len() as f64).sqrt().ceil() as usize * CELLS_PER_SQRT_AGENT)
            .clamp(1, MAX_CELLS_PER_AXIS);
        let dims = |len: f64| {
            if radius > 0.0 && len > 0.0 {
                ((len / radius * CELL_SHRINK).floor() as usize).clamp(1, max_per_axis)
            } else {
                1
            }
        };
        let grid_dim_x = dims(domain_u.length());
        let grid_dim_y = dims(domain_v.length());
        let inv_cell_size = (
            grid_dim_x as f64 / domain_u.length(),
            grid_dim_y as f64 / domain_v.length(),
        );
        let num_cells = grid_dim_x * grid_dim_y;

        let mut grid = NeighborGrid {
            domain_u,
            domain_v,
            radius,
            inv_cell_size,
            grid_dim_x,
            grid_dim_y,
            agent_cells: Vec::with_capacity(agents.len()),
            cell_counts: vec![0; num_cells],
            cell_starts: vec![0; num_cells],
            cell_agent_indices: vec![0; agents.len()],
        };

        // Phase 1: cell of each agent, and per-cell counts.
        for agent in agents {
            let (cx, cy) = grid.cell_coords(agent.uv());
            let cell = cy * grid.grid_dim_x + cx;
            grid.agent_cells.push(cell);
            grid.cell_counts[cell] += 1;
        }

        // Phase 2: prefix sum for cell start offsets.
        let mut total = 0;
        for (start, &count) in grid.cell_starts.iter_mut().zip(grid.cell_counts.iter()) {
            *start = total;
            total += count;
        }

        // Phase 3: scatter agent indices into their cell blocks (ascending within a cell).
        let mut write_offsets = vec![0usize; num_cells];
        for (idx, &cell) in grid.agent_cells.iter().enumerate() {
            let slot = grid.cell_starts[cell] + write_offsets[cell];
            grid.cell_agent_indices[slot] = idx;
            write_offsets[cell] += 1;
        }

        log::trace!(
            "Neighbor grid built: {}x{} cells for {} agents (radius {}).",
            grid.grid_dim_x, grid.grid_dim_y, agents.len(), radius
        );
        grid
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.grid_dim_x, self.grid_dim_y)
    }

    #[inline(always)]
    fn cell_coords(&self, pos: Vec2) -> (usize, usize) {
        let axis = |t: f64, domain: Interval, inv: f64, dim: usize| {
            let scaled = ((t - domain.lo) * inv).floor();
            // NaN and negatives saturate to 0 in the cast.
            (scaled as usize).min(dim - 1)
        };
        (
            axis(pos.x, self.domain_u, self.inv_cell_size.0, self.grid_dim_x),
            axis(pos.y, self.domain_v, self.inv_cell_size.1, self.grid_dim_y),
        )
    }

    /// Calls `f` for every agent other than `self_idx` strictly within the grid's radius.
    /// Stops early when `f` returns `false`. Visit order is by cell, not by index.
    pub fn for_each_neighbor<F>(&self, agents: &[Agent], self_idx: usize, mut f: F)
    where
        F: FnMut(usize) -> bool,
    {
        let Some(center) = agents.get(self_idx).map(Agent::uv) else { return };
        let (cx, cy) = self.cell_coords(center);

        for gy in cy.saturating_sub(1)..=(cy + 1).min(self.grid_dim_y - 1) {
            for gx in cx.saturating_sub(1)..=(cx + 1).min(self.grid_dim_x - 1) {
                let cell = gy * self.grid_dim_x + gx;
                let start = self.cell_starts[cell];
                let end = start + self.cell_counts[cell];

                for &neighbor_idx in &self.cell_agent_indices[start..end] {
                    if neighbor_idx == self_idx {
                        continue;
                    }
                    let Some(other) = agents.get(neighbor_idx) else {
                        log::error!("Neighbor index {} out of bounds for {} agents.", neighbor_idx, agents.len());
                        continue;
                    };
                    if within_radius(center, other.uv(), self.radius) && !f(neighbor_idx) {
                        return;
                    }
                }
            }
        }
    }

    /// Neighbor indices of `self_idx`, sorted ascending to match the reference scan.
    pub fn neighbors_of(&self, agents: &[Agent], self_idx: usize) -> Vec<usize> {
        let mut found = Vec::new();
        self.for_each_neighbor(agents, self_idx, |idx| {
            found.push(idx);
            true
        });
        found.sort_unstable();
        found
    }
}

/// Neighbor lookup over one population snapshot, using the configured strategy.
#[derive(Debug, Clone)]
pub enum NeighborQuery {
    Naive { radius: f64 },
    Grid(NeighborGrid),
}

impl NeighborQuery {
    pub fn new(
        search: NeighborSearch,
        agents: &[Agent],
        domain_u: Interval,
        domain_v: Interval,
        radius: f64,
    ) -> Self {
        match search {
            NeighborSearch::Naive => NeighborQuery::Naive { radius },
            NeighborSearch::Grid => NeighborQuery::Grid(NeighborGrid::build(agents, domain_u, domain_v, radius)),
        }
    }

    /// Ascending indices of the agents strictly within the radius of `self_idx`.
    pub fn neighbors_of(&self, agents: &[Agent], self_idx: usize) -> Vec<usize> {
        match self {
            NeighborQuery::Naive { radius } => neighbors_in_radius(agents, self_idx, *radius),
            NeighborQuery::Grid(grid) => grid.neighbors_of(agents, self_idx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::HeightfieldSurface;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn population(points: &[(f64, f64)]) -> Vec<Agent> {
        let surface = HeightfieldSurface::flat(1.0).unwrap();
        points
            .iter()
            .map(|&(u, v)| Agent::new(Vec2::new(u, v), Vec2::ZERO, &surface))
            .collect()
    }

    #[test]
    fn query_excludes_self_even_when_coincident() {
        let agents = population(&[(0.5, 0.5), (0.5, 0.5), (0.9, 0.9)]);
        assert_eq!(neighbors_in_radius(&agents, 0, 0.1), vec![1]);
        assert_eq!(neighbors_in_radius(&agents, 1, 0.1), vec![0]);

        let grid = NeighborGrid::build(&agents, Interval::unit(), Interval::unit(), 0.1);
        assert_eq!(grid.neighbors_of(&agents, 0), vec![1]);
    }

    #[test]
    fn radius_boundary_is_exclusive() {
        let agents = population(&[(0.0, 0.0), (0.5, 0.0), (0.25, 0.0)]);
        assert_eq!(neighbors_in_radius(&agents, 0, 0.5), vec![2]);
        let grid = NeighborGrid::build(&agents, Interval::unit(), Interval::unit(), 0.5);
        assert_eq!(grid.neighbors_of(&agents, 0), vec![2]);
    }

    #[test]
    fn zero_radius_finds_nobody() {
        let agents = population(&[(0.2, 0.2), (0.2, 0.2)]);
        assert!(neighbors_in_radius(&agents, 0, 0.0).is_empty());
        let query = NeighborQuery::new(NeighborSearch::Grid, &agents, Interval::unit(), Interval::unit(), 0.0);
        assert!(query.neighbors_of(&agents, 0).is_empty());
    }

    #[test]
    fn grid_matches_naive_scan() {
        let mut rng = StdRng::seed_from_u64(99);
        let points: Vec<(f64, f64)> = (0..300)
            .map(|_| (rng.random_range(0.0..=1.0), rng.random_range(0.0..=1.0)))
            .collect();
        let mut agents = population(&points);
        agents.extend(population(&[(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0)]));

        for radius in [0.01, 0.05, 0.13, 0.7, 3.0] {
            let grid = NeighborGrid::build(&agents, Interval::unit(), Interval::unit(), radius);
            for idx in 0..agents.len() {
                assert_eq!(
                    grid.neighbors_of(&agents, idx),
                    neighbors_in_radius(&agents, idx, radius),
                    "radius {} agent {}",
                    radius,
                    idx
                );
            }
        }
    }

    #[test]
    fn for_each_neighbor_stops_early() {
        let agents = population(&[(0.5, 0.5), (0.51, 0.5), (0.52, 0.5), (0.53, 0.5)]);
        let grid = NeighborGrid::build(&agents, Interval::unit(), Interval::unit(), 0.1);
        let mut visited = 0;
        grid.for_each_neighbor(&agents, 0, |_| {
            visited += 1;
            false
        });
        assert_eq!(visited, 1);
    }

    #[test]
    fn cell_count_is_capped() {
        let agents = population(&[(0.5, 0.5)]);
        let grid = NeighborGrid::build(&agents, Interval::unit(), Interval::unit(), 1e-9);
        assert_eq!(grid.dimensions(), (2, 2));

        let points: Vec<(f64, f64)> = (0..100).map(|i| ((i % 10) as f64 / 10.0, (i / 10) as f64 / 10.0)).collect();
        let agents = population(&points);
        let grid = NeighborGrid::build(&agents, Interval::unit(), Interval::unit(), 1e-6);
        assert_eq!(grid.dimensions(), (20, 20));

        // Large populations still stop at the per-axis cap.
        let many = vec![agents[0].clone(); 300_000];
        let grid = NeighborGrid::build(&many, Interval::unit(), Interval::unit(), 1e-9);
        assert_eq!(grid.dimensions(), (MAX_CELLS_PER_AXIS, MAX_CELLS_PER_AXIS));
    }

    #[test]
    fn capped_grid_still_matches_naive_scan() {
        let points: Vec<(f64, f64)> = (0..50).map(|i| (0.3 + i as f64 * 1e-4, 0.6 - i as f64 * 5e-5)).collect();
        let agents = population(&points);
        let radius = 2e-4;
        let grid = NeighborGrid::build(&agents, Interval::unit(), Interval::unit(), radius);
        assert!(grid.dimensions().0 <= 16);
        for idx in 0..agents.len() {
            assert_eq!(grid.neighbors_of(&agents, idx), neighbors_in_radius(&agents, idx, radius));
        }
    }
}
