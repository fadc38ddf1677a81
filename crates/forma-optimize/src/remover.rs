//! Least-stressed spring removal.
//!
//! Each pass deletes the `remove_ratio` fraction of bars with the lowest
//! recorded max stress, then iteratively prunes the hanging limbs the
//! deletions expose: bars left dangling on a degree-1 joint, and acute
//! degree-2 pairs that can carry no load between their far joints.
//!
//! The remover owns the incidence map and repairs it on every deletion;
//! the pruning sweep runs entirely against the map before any arena
//! commit.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use forma_graph::Incidence;
use forma_math::geometry::is_acute;
use forma_math::Sampler;
use forma_physics::Simulation;
use forma_types::constants::STRESS_DECAY;
use forma_types::{MassId, SpringId};

use crate::{bar_vector, min_spring_by_stress, sort_springs_by_stress, Optimizer};

/// Stress-based bulk spring remover.
pub struct SpringRemover {
    remove_ratio: f64,
    stop_ratio: f64,
    n_springs_start: usize,
    incidence: Incidence,
}

impl SpringRemover {
    /// `remove_ratio` is the fraction of springs deleted per pass;
    /// `stop_ratio` the fraction of the starting count below which the
    /// remover becomes a no-op.
    pub fn new(sim: &Simulation, remove_ratio: f64, stop_ratio: f64) -> Self {
        debug!(remove_ratio, stop_ratio, "spring remover ratios");
        Self {
            remove_ratio,
            stop_ratio,
            n_springs_start: sim.graph.n_springs(),
            incidence: Incidence::build(&sim.graph),
        }
    }

    /// The incidence map, for invariant checks.
    pub fn incidence(&self) -> &Incidence {
        &self.incidence
    }

    /// One removal pass.
    pub fn optimize(&mut self, sim: &mut Simulation) {
        sim.sync_up();
        let n_springs = sim.graph.n_springs();

        if n_springs as f64 <= self.n_springs_start as f64 * self.stop_ratio {
            debug!("removal stopped at stop ratio");
            return;
        }

        let mut to_delete: HashSet<SpringId> = HashSet::new();
        let mut hanging: HashMap<SpringId, ()> = HashMap::new();

        let to_remove = ((self.remove_ratio * n_springs as f64).floor() as usize).max(1);

        if to_remove > 1 {
            let sorted = sort_springs_by_stress(sim);
            for &sid in sorted.iter().take(to_remove) {
                self.mark(sim, sid, &mut to_delete, &mut hanging);
            }
        } else if let Some(sid) = min_spring_by_stress(sim) {
            self.mark(sim, sid, &mut to_delete, &mut hanging);
        }
        debug!(marked = to_delete.len(), "bulk removal marked");

        // Hanging-limb sweep over the repaired incidence map
        let mut hanging_count = 0usize;
        while !hanging.is_empty() {
            let mut next: HashMap<SpringId, ()> = HashMap::new();
            // Sorted so a pass is reproducible for a given graph
            let mut candidates: Vec<SpringId> = hanging.keys().copied().collect();
            candidates.sort();
            for sid in candidates {
                if to_delete.contains(&sid) {
                    continue;
                }
                let (left, right) = {
                    let s = sim.graph.spring(sid);
                    (s.left, s.right)
                };

                for (near, far) in [(left, right), (right, left)] {
                    if to_delete.contains(&sid) {
                        break;
                    }
                    if self.incidence.degree(near) == 1 {
                        hanging_count += 1;
                        self.mark_into(sim, sid, &mut to_delete, far, &mut next);
                    } else if self.incidence.degree(near) == 2 {
                        let partner = self
                            .incidence
                            .incident(near)
                            .iter()
                            .copied()
                            .find(|&h| h != sid);
                        if let Some(h) = partner {
                            let bar1 = bar_vector(sim, sid);
                            let bar2 = bar_vector(sim, h);
                            if is_acute(bar1, bar2) {
                                // The pair hangs off `near`; neither bar
                                // can brace the far joints.
                                let h_far = sim.graph.spring(h).opposite(near);
                                hanging_count += 2;
                                self.mark_into(sim, sid, &mut to_delete, far, &mut next);
                                self.mark_into(sim, h, &mut to_delete, h_far, &mut next);
                            }
                        }
                    }
                }
            }
            debug!(hanging_count, new = next.len(), "hanging sweep");
            hanging = next;
        }

        // Commit
        let mut doomed: Vec<SpringId> = to_delete.iter().copied().collect();
        doomed.sort();
        for sid in doomed {
            sim.delete_spring(sid);
        }
        for (_, s) in sim.graph.springs_mut() {
            s.max_stress *= STRESS_DECAY;
        }
        sim.sync_down();

        debug!(
            springs = sim.graph.n_springs(),
            removed = to_delete.len(),
            "removal pass complete"
        );
    }

    /// Marks a spring for deletion, detaches it from the map, and
    /// enqueues the surviving incidences of both endpoints.
    fn mark(
        &mut self,
        sim: &Simulation,
        sid: SpringId,
        to_delete: &mut HashSet<SpringId>,
        hanging: &mut HashMap<SpringId, ()>,
    ) {
        if !to_delete.insert(sid) {
            return;
        }
        let s = sim.graph.spring(sid);
        self.incidence.detach(sid, s.left, s.right);
        for m in [s.left, s.right] {
            for &c in self.incidence.incident(m) {
                hanging.insert(c, ());
            }
        }
    }

    /// Marks during the hanging sweep, enqueuing only the far endpoint's
    /// incidences.
    fn mark_into(
        &mut self,
        sim: &Simulation,
        sid: SpringId,
        to_delete: &mut HashSet<SpringId>,
        far: MassId,
        next: &mut HashMap<SpringId, ()>,
    ) {
        if !to_delete.insert(sid) {
            return;
        }
        let s = sim.graph.spring(sid);
        self.incidence.detach(sid, s.left, s.right);
        for &c in self.incidence.incident(far) {
            if c != sid {
                next.insert(c, ());
            }
        }
    }
}

impl Optimizer for SpringRemover {
    fn optimize(&mut self, sim: &mut Simulation, _sampler: &mut Sampler) {
        SpringRemover::optimize(self, sim);
    }
}
