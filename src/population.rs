use crate::agent::Agent;
use crate::surface::Surface;
use rayon::prelude::*;
use surface_common::{Vec2, Vec3, VelocityVector};

/// The agent population plus the buffer new velocities are computed into.
///
/// A tick first fills `next_velocities` from the unmodified `agents` (read-only), then
/// commits them and advances every agent. No write is visible until the commit.
#[derive(Debug, Clone, Default)]
pub struct Population {
    pub(crate) agents: Vec<Agent>,
    pub(crate) next_velocities: Vec<Vec2>,
}

impl Population {
    pub fn new(agents: Vec<Agent>) -> Self {
        let next_velocities = vec![Vec2::ZERO; agents.len()];
        Population { agents, next_velocities }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Agent> {
        self.agents.iter()
    }

    /// Applies the computed velocities and advances every agent.
    pub(crate) fn commit(&mut self, surface: &dyn Surface) {
        if self.next_velocities.len() != self.agents.len() {
            log::error!(
                "Velocity buffer length {} does not match population {}; skipping commit.",
                self.next_velocities.len(),
                self.agents.len()
            );
            return;
        }
        self.agents
            .par_iter_mut()
            .zip(self.next_velocities.par_iter())
            .for_each(|(agent, &velocity)| {
                agent.set_velocity(velocity);
                agent.advance(surface);
            });
    }

    /// 3D surface positions, in population order.
    pub fn positions(&self) -> Vec<Vec3> {
        self.agents.iter().map(Agent::position).collect()
    }

    /// Velocity lines for rendering: origin at the 3D position, direction `(du, dv, 0)`.
    pub fn velocity_vectors(&self) -> Vec<VelocityVector> {
        self.agents
            .iter()
            .map(|a| VelocityVector {
                origin: a.position(),
                direction: Vec3::new(a.velocity().x, a.velocity().y, 0.0),
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a Population {
    type Item = &'a Agent;
    type IntoIter = std::slice::Iter<'a, Agent>;

    fn into_iter(self) -> Self::IntoIter {
        self.agents.iter()
    }
}
