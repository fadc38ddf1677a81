//! Stressed-bar bracing.
//!
//! For each of the most-stressed bars, the inserter bisects the
//! second-order springs around it, bridges midpoint pairs that lie
//! roughly parallel to the bar, and ties new midpoints to nearby
//! second-order joints. A fusion post-pass removes the degree-2 joints
//! this leaves behind once their two bars become collinear.
//!
//! Every new or resized spring keeps `k·rest` equal to its template's.

use tracing::debug;

use forma_math::geometry::{angle_between, bisect};
use forma_math::Sampler;
use forma_physics::Simulation;
use forma_types::constants::PARALLEL_EPS;
use forma_types::{MassId, SpringId};

use crate::{sort_springs_by_stress, spring_protected, Optimizer};

/// Bracing spring inserter.
pub struct SpringInserter {
    add_ratio: f64,
    /// Spatial search cutoff. Bridging itself is bounded by the braced
    /// bar's rest length, not by this.
    pub cutoff: f64,
}

impl SpringInserter {
    pub fn new(add_ratio: f64, cutoff: f64) -> Self {
        Self { add_ratio, cutoff }
    }

    /// One insertion pass: brace the top `add_ratio` stressed bars, then
    /// fuse any collinear degree-2 pairs left over.
    pub fn optimize(&mut self, sim: &mut Simulation) {
        sim.sync_up();
        let n_springs = sim.graph.n_springs();

        let sorted = sort_springs_by_stress(sim);
        let to_add = (self.add_ratio * n_springs as f64) as usize + 1;

        let stressed: Vec<SpringId> = sorted.iter().rev().take(to_add).copied().collect();
        debug!(bracing = stressed.len(), "insertion pass");

        for sid in stressed {
            if sim.graph.try_spring(sid).is_some() {
                self.brace_spring(sim, sid);
            }
        }

        let combined = combine_parallel_springs(sim);
        debug!(combined, "fused parallel pairs");

        sim.sync_down();
    }

    /// Braces one stressed bar.
    fn brace_spring(&mut self, sim: &mut Simulation, sid: SpringId) {
        let (m1, m2, svec, template, half_cutoff) = {
            let s = sim.graph.spring(sid);
            (
                s.left,
                s.right,
                sim.graph.mass(s.left).pos - sim.graph.mass(s.right).pos,
                s.clone(),
                s.rest / 2.0,
            )
        };

        // Second-order springs (bisectable) and masses (tie targets)
        let mut springs_so: Vec<SpringId> = Vec::new();
        let mut masses_so: Vec<MassId> = Vec::new();
        for osid in sim.graph.spring_ids() {
            if osid == sid {
                continue;
            }
            let o = sim.graph.spring(osid);
            let touches = o.touches(m1) || o.touches(m2);
            if !touches {
                continue;
            }
            if !spring_protected(sim, osid) {
                springs_so.push(osid);
            }
            for shared in [m1, m2] {
                if o.touches(shared) {
                    masses_so.push(o.opposite(shared));
                }
            }
        }
        debug!(count = springs_so.len(), "second order springs");

        // Midpoints at current and original positions
        let mids: Vec<_> = springs_so
            .iter()
            .map(|&osid| {
                let o = sim.graph.spring(osid);
                (
                    bisect(sim.graph.mass(o.left).pos, sim.graph.mass(o.right).pos),
                    bisect(
                        sim.graph.mass(o.left).origpos,
                        sim.graph.mass(o.right).origpos,
                    ),
                )
            })
            .collect();

        let mut mid_mass: Vec<Option<MassId>> = vec![None; springs_so.len()];
        let mut added = 0usize;

        for i in 0..mids.len() {
            for j in (i + 1)..mids.len() {
                let mvec = mids[i].0 - mids[j].0;
                if mvec.length() > half_cutoff * 2.0 {
                    continue;
                }
                if angle_between(mvec, svec) > std::f64::consts::FRAC_PI_4 {
                    continue;
                }

                let n = self.materialize(sim, &mut mid_mass, i, &springs_so, mids[i]);
                let o = self.materialize(sim, &mut mid_mass, j, &springs_so, mids[j]);

                sim.create_spring(&template, n, o);
                added += 1;
            }
        }

        // Periphery ties from each new midpoint to close second-order joints
        let created: Vec<MassId> = mid_mass.iter().flatten().copied().collect();
        for &p in &created {
            for &so in &masses_so {
                if so == p || sim.graph.spring_exists(p, so) {
                    continue;
                }
                let v = sim.graph.mass(so).origpos - sim.graph.mass(p).origpos;
                if v.length() <= half_cutoff {
                    sim.create_spring(&template, so, p);
                    added += 1;
                }
            }
        }

        sim.graph.spring_mut(sid).max_stress = 0.0;
        debug!(added, "braced spring");
    }

    /// Returns the midpoint mass for second-order spring `i`, bisecting
    /// the spring on first use.
    fn materialize(
        &self,
        sim: &mut Simulation,
        mid_mass: &mut [Option<MassId>],
        i: usize,
        springs_so: &[SpringId],
        mid: (glam::DVec3, glam::DVec3),
    ) -> MassId {
        if let Some(existing) = mid_mass[i] {
            return existing;
        }
        let m = sim.create_mass(mid.0);
        sim.graph.mass_mut(m).origpos = mid.1;
        bisect_spring(sim, springs_so[i], m);
        mid_mass[i] = Some(m);
        m
    }
}

impl Optimizer for SpringInserter {
    fn optimize(&mut self, sim: &mut Simulation, _sampler: &mut Sampler) {
        SpringInserter::optimize(self, sim);
    }
}

/// Splits a spring at `mid`, which must be a fresh unconnected mass.
///
/// The existing spring keeps its left endpoint and becomes the left
/// half (`rest` halved, `k` doubled); a clone becomes the right half.
pub fn bisect_spring(sim: &mut Simulation, sid: SpringId, mid: MassId) {
    let right = sim.graph.spring(sid).right;
    let left = sim.graph.spring(sid).left;

    // Weight the midpoint like a share of each endpoint
    let lm = sim.graph.mass(left);
    let rm = sim.graph.mass(right);
    let w = lm.m / lm.spring_count.max(1) as f64 + rm.m / rm.spring_count.max(1) as f64;
    sim.graph.mass_mut(mid).m = w;

    sim.graph.repoint_spring(sid, right, mid);
    {
        let s = sim.graph.spring_mut(sid);
        s.rest *= 0.5;
        s.k *= 2.0;
    }

    let mut half = sim.graph.spring(sid).clone();
    half.left = mid;
    half.right = right;
    sim.insert_spring(half);
}

/// Fuses collinear spring pairs that meet at a degree-2 joint: one
/// spring is extended to span the far endpoints (preserving `k·rest`),
/// the other is deleted along with the joint.
///
/// Returns the number of fused pairs.
pub fn combine_parallel_springs(sim: &mut Simulation) -> usize {
    let mut combined = 0;
    let ids = sim.graph.spring_ids();

    for ai in 0..ids.len() {
        for bi in (ai + 1)..ids.len() {
            let (a, b) = (ids[ai], ids[bi]);
            if sim.graph.try_spring(a).is_none() || sim.graph.try_spring(b).is_none() {
                continue;
            }

            let sa = sim.graph.spring(a);
            let sb = sim.graph.spring(b);
            let com = if sb.touches(sa.left) {
                sa.left
            } else if sb.touches(sa.right) {
                sa.right
            } else {
                continue;
            };
            if sim.graph.mass(com).spring_count != 2 {
                continue;
            }
            if sa.opposite(com) == sb.opposite(com) {
                // Double edge; nothing to span
                continue;
            }

            let av = sim.graph.mass(sa.left).pos - sim.graph.mass(sa.right).pos;
            let bv = sim.graph.mass(sb.left).pos - sim.graph.mass(sb.right).pos;
            let angle = angle_between(av, bv);
            if angle > PARALLEL_EPS && angle < std::f64::consts::PI - PARALLEL_EPS {
                continue;
            }

            join_springs(sim, a, b, com);
            combined += 1;
        }
    }
    combined
}

/// Joins two springs sharing the degree-2 mass `com`: `a` is extended
/// across both spans, `b` and `com` are deleted.
pub fn join_springs(sim: &mut Simulation, a: SpringId, b: SpringId, com: MassId) {
    let sep2 = sim.graph.spring(b).opposite(com);
    let sep1 = sim.graph.spring(a).opposite(com);

    let span = (sim.graph.mass(sep1).pos - sim.graph.mass(sep2).pos).length();
    sim.graph.repoint_spring(a, com, sep2);
    {
        let s = sim.graph.spring_mut(a);
        s.k *= s.rest / span;
        s.rest = span;
    }

    sim.delete_spring(b);
    sim.delete_mass(com);
}
