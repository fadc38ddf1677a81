//! Scoped aggregates and bounded relaxation.
//!
//! Length is the sum of rest lengths; energy is `Σ force²/k`. Both can
//! be evaluated over the whole simulation, a container view, or an
//! explicit spring set — the same scope the optimizers use for their
//! accept/reject decisions.

use glam::DVec3;
use tracing::debug;

use forma_types::constants::{EQUILIBRIUM_WINDOWS, SETTLE_CAP_WINDOWS};
use forma_types::{ContainerId, MassId, SpringId};

use crate::simulation::Simulation;

/// Which springs an aggregate ranges over.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// Every live spring.
    All,
    /// Springs listed in one container.
    Container(ContainerId),
    /// An explicit spring set (e.g. a mass group).
    Springs(&'a [SpringId]),
}

/// Sum of rest lengths over the scope.
pub fn total_length(sim: &Simulation, scope: Scope) -> f64 {
    match scope {
        Scope::All => sim.graph.springs().map(|(_, s)| s.rest).sum(),
        Scope::Container(c) => sim
            .graph
            .container(c)
            .springs
            .iter()
            .map(|&id| sim.graph.spring(id).rest)
            .sum(),
        Scope::Springs(ids) => ids.iter().map(|&id| sim.graph.spring(id).rest).sum(),
    }
}

/// Sum of `force²/k` over the scope.
pub fn total_energy(sim: &Simulation, scope: Scope) -> f64 {
    match scope {
        Scope::All => sim.graph.springs().map(|(_, s)| s.energy()).sum(),
        Scope::Container(c) => sim
            .graph
            .container(c)
            .springs
            .iter()
            .map(|&id| sim.graph.spring(id).energy())
            .sum(),
        Scope::Springs(ids) => ids.iter().map(|&id| sim.graph.spring(id).energy()).sum(),
    }
}

/// Distance between the current and original centroid of `points`.
///
/// The driver passes the masses that carry load-queue forces.
pub fn deflection(sim: &Simulation, points: &[MassId]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let mut now = DVec3::ZERO;
    let mut orig = DVec3::ZERO;
    for &id in points {
        let m = sim.graph.mass(id);
        now += m.pos;
        orig += m.origpos;
    }
    let n = points.len() as f64;
    (now / n - orig / n).length()
}

/// One tracked-mass sample from [`relax`].
#[derive(Debug, Clone)]
pub struct TrackSample {
    pub step: u32,
    pub pos: DVec3,
    pub force: DVec3,
    pub index: usize,
}

/// Advances physics in windows of `dt·100` until the total energy holds
/// within `eps` (relative) for ten consecutive windows. With a cap, also
/// terminates once the energy exceeds the cap after fifty windows.
///
/// Returns the number of windows stepped. A non-finite energy is a
/// programmer error: the full state is dumped and the process aborts.
pub fn settle(sim: &mut Simulation, eps: f64, cap: Option<f64>) -> u32 {
    let mut prev_energy = 0.0;
    let mut close_to_previous = 0u32;
    let mut windows = 0u32;

    loop {
        let energy = total_energy(sim, Scope::All);
        assert_finite_energy(sim, energy);
        debug!(energy, prev_energy, close_to_previous, "settle window");

        if prev_energy > 0.0 && (prev_energy - energy).abs() < energy * eps {
            close_to_previous += 1;
        } else {
            close_to_previous = 0;
        }
        if close_to_previous > EQUILIBRIUM_WINDOWS {
            return windows;
        }
        if let Some(cap) = cap {
            if energy > cap && windows > SETTLE_CAP_WINDOWS {
                return windows;
            }
        }
        prev_energy = energy;

        sim.step(sim.dt() * 100.0);
        sim.sync_up();
        windows += 1;
    }
}

/// Advances physics by exactly `steps` substeps. With a non-empty
/// tracked set, samples each tracked mass before the first substep and
/// after every substep.
pub fn relax(sim: &mut Simulation, steps: u32, tracked: &[MassId]) -> Vec<TrackSample> {
    if tracked.is_empty() {
        sim.step(sim.dt() * steps as f64);
        sim.sync_up();
        return Vec::new();
    }

    let mut samples = Vec::with_capacity((steps as usize + 1) * tracked.len());
    sim.sync_up();
    sample_tracked(sim, 0, tracked, &mut samples);
    for i in 0..steps {
        sim.step(sim.dt());
        sim.sync_up();
        sample_tracked(sim, i + 1, tracked, &mut samples);
    }
    samples
}

fn sample_tracked(sim: &Simulation, step: u32, tracked: &[MassId], out: &mut Vec<TrackSample>) {
    for (n, &id) in tracked.iter().enumerate() {
        let m = sim.graph.mass(id);
        out.push(TrackSample {
            step,
            pos: m.pos,
            force: m.acc * m.m,
            index: n,
        });
    }
}

/// NaN energy means the integration diverged through a topology bug.
/// Dump everything to stdout and terminate.
pub fn assert_finite_energy(sim: &Simulation, energy: f64) {
    if energy.is_finite() {
        return;
    }
    for (id, m) in sim.graph.masses() {
        println!(
            "Mass {} m {} pos {},{},{}",
            id.0, m.m, m.pos.x, m.pos.y, m.pos.z
        );
    }
    for (_, s) in sim.graph.springs() {
        println!(
            "Spring {},{} rest {} k {}",
            s.left.0, s.right.0, s.rest, s.k
        );
    }
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::PhysicsParams;
    use forma_graph::generators::cubic_lattice;
    use forma_graph::BarParams;
    use glam::DVec3;

    fn loaded_lattice() -> Simulation {
        let bar = BarParams::default();
        let mut graph = cubic_lattice(DVec3::ZERO, [1, 1, 1], 0.1, &bar);
        let ids = graph.mass_ids();
        graph.mass_mut(ids[0]).fix();
        {
            let m = graph.mass_mut(ids[7]);
            m.extforce = DVec3::new(0.0, -1.0, 0.0);
            m.extduration = f64::INFINITY;
        }
        Simulation::new(graph, PhysicsParams::default())
    }

    #[test]
    fn energy_is_zero_at_rest() {
        let sim = Simulation::new(
            cubic_lattice(DVec3::ZERO, [1, 1, 1], 0.1, &BarParams::default()),
            PhysicsParams::default(),
        );
        assert_eq!(total_energy(&sim, Scope::All), 0.0);
        assert!((total_length(&sim, Scope::All) - 12.0 * 0.1).abs() < 1e-12);
    }

    #[test]
    fn settle_reaches_equilibrium_under_load() {
        let mut sim = loaded_lattice();
        let windows = settle(&mut sim, 1e-4, None);
        assert!(windows > 0);
        assert!(total_energy(&sim, Scope::All) > 0.0);
    }

    #[test]
    fn relax_tracks_masses_per_step() {
        let mut sim = loaded_lattice();
        let tracked = vec![sim.graph.mass_ids()[7]];
        let samples = relax(&mut sim, 10, &tracked);
        assert_eq!(samples.len(), 11);
        assert_eq!(samples[0].step, 0);
        assert_eq!(samples[10].step, 10);
    }

    #[test]
    fn deflection_grows_under_load() {
        let mut sim = loaded_lattice();
        let loaded: Vec<_> = sim
            .graph
            .masses()
            .filter(|(_, m)| m.loaded())
            .map(|(id, _)| id)
            .collect();
        relax(&mut sim, 500, &[]);
        assert!(deflection(&sim, &loaded) > 0.0);
    }
}
