//! Resolved loadcases.
//!
//! The design document references volumes; by the time the driver runs,
//! anchors and forces are resolved to concrete mass sets. Applying a
//! load fixes the anchor masses and distributes each force vector
//! equally over its masses.

use glam::DVec3;
use tracing::debug;

use forma_graph::LatticeGraph;
use forma_math::geometry::in_bounds;
use forma_math::Sampler;
use forma_physics::Simulation;
use forma_types::MassId;

/// A force resolved to the masses it acts on.
#[derive(Debug, Clone)]
pub struct ResolvedForce {
    pub masses: Vec<MassId>,
    pub magnitude: DVec3,
    /// Seconds; ∞ means the force never expires.
    pub duration: f64,
    /// Per-component half-range for direction variation; zero disables.
    pub vary: DVec3,
}

/// A loadcase resolved to mass sets.
#[derive(Debug, Clone, Default)]
pub struct ResolvedLoadcase {
    pub anchors: Vec<Vec<MassId>>,
    pub forces: Vec<ResolvedForce>,
    pub total_duration: f64,
}

impl ResolvedLoadcase {
    /// All masses any force in this loadcase acts on.
    pub fn force_masses(&self) -> Vec<MassId> {
        let mut out = Vec::new();
        for f in &self.forces {
            for &m in &f.masses {
                if !out.contains(&m) {
                    out.push(m);
                }
            }
        }
        out
    }
}

/// Masses whose current position lies in `[min, max]` (inclusive, with a
/// small tolerance on the faces).
pub fn select_masses_in_box(graph: &LatticeGraph, min: DVec3, max: DVec3) -> Vec<MassId> {
    let eps = DVec3::splat(1.0e-9);
    graph
        .masses()
        .filter(|(_, m)| in_bounds(m.pos, min - eps, max + eps))
        .map(|(id, _)| id)
        .collect()
}

/// Zeroes every external force and unfixes every mass.
pub fn clear_loads(sim: &mut Simulation) {
    for (_, m) in sim.graph.masses_mut() {
        m.extforce = DVec3::ZERO;
        m.extduration = 0.0;
        m.unfix();
    }
    sim.sync_down();
}

/// Fixes the anchors and accumulates each force, distributed equally
/// over its masses. Negative durations were normalized to ∞ upstream.
pub fn apply_load(sim: &mut Simulation, load: &ResolvedLoadcase) {
    sim.sync_up();

    for anchor in &load.anchors {
        for &m in anchor {
            sim.graph.mass_mut(m).fix();
        }
    }
    for force in &load.forces {
        if force.masses.is_empty() {
            continue;
        }
        let distributed = force.magnitude / force.masses.len() as f64;
        for &m in &force.masses {
            let mass = sim.graph.mass_mut(m);
            mass.extforce += distributed;
            mass.extduration += force.duration;
            if mass.extduration < 0.0 {
                mass.extduration = f64::INFINITY;
            }
        }
    }
    debug!(
        anchors = load.anchors.iter().map(Vec::len).sum::<usize>(),
        forces = load.forces.len(),
        "applied load"
    );
    sim.sync_down();
}

/// Re-applies every force of the loadcase with its direction perturbed
/// by a uniform sample in `±vary` per component, renormalized.
pub fn vary_load_direction(sim: &mut Simulation, load: &ResolvedLoadcase, sampler: &mut Sampler) {
    for (_, m) in sim.graph.masses_mut() {
        m.extforce = DVec3::ZERO;
    }
    for force in &load.forces {
        if force.masses.is_empty() {
            continue;
        }
        let distributed_mag = (force.magnitude / force.masses.len() as f64).length();
        let mut dir = force.magnitude.normalize_or_zero();
        if force.vary != DVec3::ZERO {
            let jitter = DVec3::new(
                sampler.range(-force.vary.x, force.vary.x),
                sampler.range(-force.vary.y, force.vary.y),
                sampler.range(-force.vary.z, force.vary.z),
            );
            dir = (dir + jitter).normalize_or_zero();
            debug!(?dir, "varied load direction");
        }
        for &m in &force.masses {
            sim.graph.mass_mut(m).extforce += distributed_mag * dir;
        }
    }
    sim.sync_down();
}
