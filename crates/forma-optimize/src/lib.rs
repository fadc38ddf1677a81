//! # forma-optimize
//!
//! The three topology optimizers that evolve a loaded lattice toward a
//! lighter, stiffer structure:
//!
//! - [`SpringRemover`] — bulk removal of the least-stressed bars with
//!   hanging-limb cleanup,
//! - [`SpringInserter`] — bracing of highly stressed bars by bisecting
//!   their neighborhood and bridging the midpoints,
//! - [`MassDisplacer`] — stochastic relocation of joints, accepted when
//!   the strain-energy × length objective improves.
//!
//! All three mutate the graph through the Physics Adapter and request a
//! device sync before returning.

pub mod displacer;
pub mod inserter;
pub mod remover;

use glam::DVec3;

use forma_math::Sampler;
use forma_physics::Simulation;
use forma_types::{MassId, SpringId};

pub use displacer::{DisplacementMode, MassDisplacer, MassDisplacerConfig, TileStrategy};
pub use inserter::SpringInserter;
pub use remover::SpringRemover;

/// One optimization pass over the simulation.
///
/// The driver holds the active optimizer behind this trait and calls it
/// between physics windows.
pub trait Optimizer {
    fn optimize(&mut self, sim: &mut Simulation, sampler: &mut Sampler);
}

/// A bar is exempt from removal/bracing when both of its endpoints are
/// fixed or both carry external load.
pub(crate) fn spring_protected(sim: &Simulation, sid: SpringId) -> bool {
    let s = sim.graph.spring(sid);
    let l = sim.graph.mass(s.left);
    let r = sim.graph.mass(s.right);
    (l.fixed && r.fixed) || (l.loaded() && r.loaded())
}

/// Unprotected springs sorted ascending by recorded max stress.
pub fn sort_springs_by_stress(sim: &Simulation) -> Vec<SpringId> {
    let mut ids: Vec<SpringId> = sim
        .graph
        .spring_ids()
        .into_iter()
        .filter(|&sid| !spring_protected(sim, sid))
        .collect();
    ids.sort_by(|&a, &b| {
        let sa = sim.graph.spring(a).max_stress;
        let sb = sim.graph.spring(b).max_stress;
        sa.partial_cmp(&sb).unwrap_or(std::cmp::Ordering::Equal)
    });
    ids
}

/// The unprotected spring with the lowest recorded max stress.
pub fn min_spring_by_stress(sim: &Simulation) -> Option<SpringId> {
    sort_springs_by_stress(sim).into_iter().next()
}

/// Bar direction vector, `right - left`, at current positions.
pub(crate) fn bar_vector(sim: &Simulation, sid: SpringId) -> DVec3 {
    let s = sim.graph.spring(sid);
    sim.graph.mass(s.right).pos - sim.graph.mass(s.left).pos
}

/// Force the spring currently applies to its endpoint `m`.
///
/// Tension pulls the endpoint toward the opposite one.
pub(crate) fn spring_force_on(sim: &Simulation, sid: SpringId, m: MassId) -> DVec3 {
    let s = sim.graph.spring(sid);
    let l = sim.graph.mass(s.left).pos;
    let r = sim.graph.mass(s.right).pos;
    let d = r - l;
    let len = d.length();
    if len <= f64::EPSILON {
        return DVec3::ZERO;
    }
    let dir = d / len;
    if s.left == m {
        s.force * dir
    } else {
        -s.force * dir
    }
}
