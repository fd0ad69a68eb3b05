use crate::field::FieldGrid;
use crate::surface::{Axis, Surface};
use rand::Rng;
use serde::{Deserialize, Serialize};
use surface_common::{FieldSampling, StepParams, Vec2, Vec3};

const MAX_DIRECTION_DRAWS: usize = 16;

/// A point agent moving in the UV domain of a surface.
///
/// The agent only owns its own state. The shared [`FieldGrid`] and [`Surface`] are passed
/// in by reference on every call and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    uv: Vec2,
    velocity: Vec2,
    position: Vec3,
}

impl Agent {
    /// Places an agent at `uv` (clamped into the surface domain).
    pub fn new(uv: Vec2, velocity: Vec2, surface: &dyn Surface) -> Self {
        let mut agent = Agent { uv, velocity, position: Vec3::ZERO };
        agent.clamp_to_domain(surface);
        agent.position = surface.evaluate(agent.uv.x, agent.uv.y);
        agent
    }

    /// UV position.
    pub fn uv(&self) -> Vec2 {
        self.uv
    }

    /// UV velocity per tick.
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// 3D position on the surface at the current UV.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn distance_to(&self, other: &Agent) -> f64 {
        self.uv.distance(other.uv)
    }

    /// Field cell under the agent.
    pub fn sample_field_indices(&self, field: &FieldGrid) -> (usize, usize) {
        field.cell_indices(self.uv)
    }

    /// Curvature never steers: returns a zero force and the speed scale `1 - curvature`.
    pub fn curvature_force(&self, field: &FieldGrid, sampling: FieldSampling) -> (Vec2, f64) {
        let curvature = field.sample_curvature(self.uv, sampling);
        (Vec2::ZERO, 1.0 - curvature)
    }

    /// Downhill pull: `slope_magnitude * slope_direction` in UV components.
    pub fn slope_force(&self, field: &FieldGrid, sampling: FieldSampling) -> Vec2 {
        field.sample_slope_force(self.uv, sampling)
    }

    /// Push away from each neighbor, weighted `1 - min(d / radius, 1)`.
    ///
    /// The weighted unit vectors are summed without normalizing. A neighbor at exactly
    /// the same position pushes along a random unit direction drawn from `rng`.
    pub fn separation_force<R: Rng>(&self, neighbors: &[&Agent], radius: f64, rng: &mut R) -> Vec2 {
        let mut steer = Vec2::ZERO;
        for other in neighbors {
            let away = self.uv - other.uv;
            let d = away.length();
            let direction = if d == 0.0 { random_unit_direction(rng) } else { away / d };
            steer += direction * separation_weight(d, radius);
        }
        steer
    }

    /// Unit vector toward the neighbors' centroid.
    pub fn cohesion_force(&self, neighbors: &[&Agent]) -> Vec2 {
        if neighbors.is_empty() {
            return Vec2::ZERO;
        }
        let sum = neighbors.iter().fold(Vec2::ZERO, |acc, o| acc + o.uv);
        let center = sum / neighbors.len() as f64;
        unit_or_zero(center - self.uv)
    }

    /// Unit vector along the neighbors' mean velocity.
    pub fn alignment_force(&self, neighbors: &[&Agent]) -> Vec2 {
        if neighbors.is_empty() {
            return Vec2::ZERO;
        }
        let sum = neighbors.iter().fold(Vec2::ZERO, |acc, o| acc + o.velocity);
        unit_or_zero(sum / neighbors.len() as f64)
    }

    /// The velocity `steer` would assign, without mutating the agent.
    pub fn steered_velocity<R: Rng>(
        &self,
        field: &FieldGrid,
        neighbors: Option<&[&Agent]>,
        params: &StepParams,
        rng: &mut R,
    ) -> Vec2 {
        let weights = &params.weights;
        let mut velocity = self.velocity;

        let (curvature, speed_scale) = self.curvature_force(field, params.field_sampling);
        let slope = self.slope_force(field, params.field_sampling);
        velocity += curvature * weights.curvature + slope * weights.slope;
        velocity *= speed_scale;

        if let Some(neighbors) = neighbors {
            let separation = self.separation_force(neighbors, params.radius, rng);
            let cohesion = self.cohesion_force(neighbors);
            let alignment = self.alignment_force(neighbors);
            velocity += separation * weights.separation
                + cohesion * weights.cohesion
                + alignment * weights.alignment;
        }

        let velocity = velocity.clamp_length_max(params.max_speed);
        if velocity.is_finite() { velocity } else { Vec2::ZERO }
    }

    /// Blend field and neighbor forces into the velocity, then cap |velocity| at
    /// `params.max_speed`. `neighbors = None` applies field forces only.
    pub fn steer<R: Rng>(
        &mut self,
        field: &FieldGrid,
        neighbors: Option<&[&Agent]>,
        params: &StepParams,
        rng: &mut R,
    ) {
        self.velocity = self.steered_velocity(field, neighbors, params, rng);
    }

    pub(crate) fn set_velocity(&mut self, velocity: Vec2) {
        self.velocity = velocity;
    }

    /// Move by one velocity step and clamp into the domain. The velocity is left as is,
    /// so an agent can stay pinned to a boundary while still heading outward.
    pub fn advance(&mut self, surface: &dyn Surface) {
        let next = self.uv + self.velocity;
        if next.is_finite() {
            self.uv = next;
        }
        self.clamp_to_domain(surface);
        self.position = surface.evaluate(self.uv.x, self.uv.y);
    }

    fn clamp_to_domain(&mut self, surface: &dyn Surface) {
        let (du, dv) = (surface.domain(Axis::U), surface.domain(Axis::V));
        let u = if self.uv.x.is_finite() { du.clamp(self.uv.x) } else { du.lo };
        let v = if self.uv.y.is_finite() { dv.clamp(self.uv.y) } else { dv.lo };
        self.uv = Vec2::new(u, v);
    }

    /// True when the agent sits on any edge of the domain.
    pub fn is_pinned(&self, surface: &dyn Surface) -> bool {
        let (du, dv) = (surface.domain(Axis::U), surface.domain(Axis::V));
        self.uv.x == du.lo || self.uv.x == du.hi || self.uv.y == dv.lo || self.uv.y == dv.hi
    }
}

fn separation_weight(distance: f64, radius: f64) -> f64 {
    if radius > 0.0 {
        1.0 - (distance / radius).min(1.0)
    } else {
        0.0
    }
}

fn unit_or_zero(v: Vec2) -> Vec2 {
    let len = v.length();
    if len == 0.0 || !len.is_finite() { Vec2::ZERO } else { v / len }
}

/// Uniform direction from the square `[-1, 1)^2`, normalized.
fn random_unit_direction<R: Rng>(rng: &mut R) -> Vec2 {
    for _ in 0..MAX_DIRECTION_DRAWS {
        let candidate = Vec2::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0));
        let len = candidate.length();
        if len > 0.0 {
            return candidate / len;
        }
    }
    Vec2::new(1.0, 0.0)
}
