//! The Physics Adapter.
//!
//! [`Simulation`] owns the graph and the device buffers and exposes the
//! sync contract: between `sync_down()` and the next host-side mutation,
//! device state equals host state; `sync_up()` pulls current positions,
//! velocities, accelerations, and spring forces back into the arenas.
//!
//! Topology mutations (create/delete) go through the adapter so the
//! device is marked stale and refreshed before the next step.

use glam::DVec3;

use forma_graph::{Container, LatticeGraph, Mass, Spring};
use forma_types::constants::DEFAULT_DT;
use forma_types::{ContainerId, MassId, SpringId};

use crate::buffers::DeviceBuffers;

/// Integration parameters.
#[derive(Debug, Clone)]
pub struct PhysicsParams {
    /// Integrator substep (seconds).
    pub dt: f64,
    /// Multiplicative velocity damping per substep.
    pub damping: f64,
    /// Global acceleration applied to every free mass.
    pub gravity: DVec3,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            dt: DEFAULT_DT,
            damping: 0.995,
            gravity: DVec3::ZERO,
        }
    }
}

/// The simulation: graph + device buffers + clock.
pub struct Simulation {
    pub graph: LatticeGraph,
    device: DeviceBuffers,
    params: PhysicsParams,
    time: f64,
    dirty: bool,
}

impl Simulation {
    /// Wraps a graph and pushes its state to the device.
    pub fn new(graph: LatticeGraph, params: PhysicsParams) -> Self {
        let mut sim = Self {
            graph,
            device: DeviceBuffers::default(),
            params,
            time: 0.0,
            dirty: true,
        };
        sim.sync_down();
        sim
    }

    pub fn params(&self) -> &PhysicsParams {
        &self.params
    }

    /// Integrator substep length.
    pub fn dt(&self) -> f64 {
        self.params.dt
    }

    /// Simulated time.
    pub fn time(&self) -> f64 {
        self.time
    }

    // ─── Sync contract ────────────────────────────────────────

    /// Marks the device stale after a direct graph mutation, forcing a
    /// refresh before the next step.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Pushes host (arena) state to the device buffers.
    pub fn sync_down(&mut self) {
        self.device.load_from(&self.graph);
        self.dirty = false;
    }

    /// Pulls device state back into the arenas.
    pub fn sync_up(&mut self) {
        self.device.store_into(&mut self.graph);
    }

    /// Advances the device by `duration` seconds in fixed substeps.
    pub fn step(&mut self, duration: f64) {
        if self.dirty {
            self.sync_down();
        }
        let n = (duration / self.params.dt).round().max(1.0) as u64;
        for _ in 0..n {
            self.substep();
        }
        self.time += n as f64 * self.params.dt;
    }

    fn substep(&mut self) {
        let dev = &mut self.device;
        let dt = self.params.dt;

        for f in dev.force.iter_mut() {
            *f = DVec3::ZERO;
        }

        // Hooke forces, tension positive
        for s in 0..dev.spring_alive.len() {
            if !dev.spring_alive[s] || !dev.compute[s] {
                continue;
            }
            let l = dev.left[s] as usize;
            let r = dev.right[s] as usize;
            let d = dev.pos[r] - dev.pos[l];
            let len = d.length();
            if len <= f64::EPSILON {
                dev.spring_force[s] = 0.0;
                continue;
            }
            let f = dev.k[s] * (len - dev.rest[s]);
            let dir = d / len;
            dev.force[l] += f * dir;
            dev.force[r] -= f * dir;
            dev.spring_force[s] = f;
            if f.abs() > dev.max_stress[s] {
                dev.max_stress[s] = f.abs();
            }
        }

        for i in 0..dev.mass_alive.len() {
            if !dev.mass_alive[i] {
                continue;
            }
            if dev.fixed[i] {
                dev.vel[i] = DVec3::ZERO;
                dev.acc[i] = DVec3::ZERO;
                continue;
            }
            let mut total = dev.force[i] + self.params.gravity * dev.m[i];
            if dev.extduration[i] > 0.0 {
                total += dev.extforce[i];
                if dev.extduration[i].is_finite() {
                    dev.extduration[i] = (dev.extduration[i] - dt).max(0.0);
                }
            }
            dev.acc[i] = total / dev.m[i];
            dev.vel[i] = (dev.vel[i] + dev.acc[i] * dt) * self.params.damping;
            dev.pos[i] += dev.vel[i] * dt;
        }
    }

    // ─── Topology mutation ────────────────────────────────────

    /// Creates a free mass at `pos`, weighting it like the graph average.
    pub fn create_mass(&mut self, pos: DVec3) -> MassId {
        let m = if self.graph.n_masses() > 0 {
            self.graph.total_mass() / self.graph.n_masses() as f64
        } else {
            1.0
        };
        self.dirty = true;
        self.graph.add_mass(Mass::new(pos, m))
    }

    /// Creates a spring between `left` and `right` from a template,
    /// rest length measured between original positions and stiffness
    /// rescaled to preserve the template's `k·rest`.
    pub fn create_spring(&mut self, template: &Spring, left: MassId, right: MassId) -> SpringId {
        let rest = (self.graph.mass(left).origpos - self.graph.mass(right).origpos).length();
        let spring = Spring::from_template(template, left, right, rest);
        self.dirty = true;
        self.graph.add_spring(spring)
    }

    /// Inserts an already-built spring (endpoints and rest preset).
    pub fn insert_spring(&mut self, spring: Spring) -> SpringId {
        self.dirty = true;
        self.graph.add_spring(spring)
    }

    /// Deletes a spring from the arena, every container, and the device.
    pub fn delete_spring(&mut self, id: SpringId) -> Spring {
        self.dirty = true;
        self.graph.remove_spring(id)
    }

    /// Deletes a mass. Incident springs must be gone or re-pointed.
    pub fn delete_mass(&mut self, id: MassId) -> Mass {
        self.dirty = true;
        self.graph.remove_mass(id)
    }

    pub fn create_container(&mut self) -> ContainerId {
        self.graph.add_container()
    }

    pub fn container(&self, id: ContainerId) -> &Container {
        self.graph.container(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forma_graph::generators::cubic_lattice;
    use forma_graph::BarParams;

    #[test]
    fn stretched_bar_pulls_endpoints_together() {
        let mut graph = LatticeGraph::new();
        let a = graph.add_mass(Mass::new(DVec3::ZERO, 1.0));
        let b = graph.add_mass(Mass::new(DVec3::X * 1.5, 1.0));
        graph.mass_mut(a).fix();
        graph.add_spring(Spring::new(a, b, 1.0, 100.0));

        let mut sim = Simulation::new(graph, PhysicsParams::default());
        sim.step(0.05);
        sim.sync_up();

        assert!(sim.graph.mass(b).pos.x < 1.5);
        let (_, s) = sim.graph.springs().next().unwrap();
        assert!(s.max_stress > 0.0);
    }

    #[test]
    fn fixed_masses_do_not_move() {
        let bar = BarParams::default();
        let mut graph = cubic_lattice(DVec3::ZERO, [1, 1, 1], 0.1, &bar);
        let anchored = graph.mass_ids()[0];
        graph.mass_mut(anchored).fix();
        let before = graph.mass(anchored).pos;

        let mut sim = Simulation::new(
            graph,
            PhysicsParams {
                gravity: DVec3::new(0.0, -9.81, 0.0),
                ..Default::default()
            },
        );
        sim.step(0.05);
        sim.sync_up();
        assert_eq!(sim.graph.mass(anchored).pos, before);
    }

    #[test]
    fn external_force_expires_with_duration() {
        let mut graph = LatticeGraph::new();
        let a = graph.add_mass(Mass::new(DVec3::ZERO, 1.0));
        {
            let m = graph.mass_mut(a);
            m.extforce = DVec3::X;
            m.extduration = 0.01;
        }
        let mut sim = Simulation::new(graph, PhysicsParams::default());
        sim.step(0.05);
        sim.sync_up();
        assert_eq!(sim.graph.mass(a).extduration, 0.0);
        assert!(sim.graph.mass(a).pos.x > 0.0);
    }

    #[test]
    fn deleting_a_spring_detaches_it_from_the_device() {
        let bar = BarParams::default();
        let graph = cubic_lattice(DVec3::ZERO, [1, 1, 1], 0.1, &bar);
        let mut sim = Simulation::new(graph, PhysicsParams::default());
        let victim = sim.graph.spring_ids()[0];
        sim.delete_spring(victim);
        sim.step(0.01);
        sim.sync_up();
        assert_eq!(sim.graph.n_springs(), 11);
    }
}
