//! Mass groups: tile and cluster decomposition of the lattice.
//!
//! A mass group is the per-tile scratch structure the localized trial
//! works in: interior masses and springs, the displaceable candidates,
//! and the border ("trench") springs that cross into neighboring tiles.
//! Severing every trench spring — after folding its force into the edge
//! masses as a constant external load — partitions the simulation so
//! each tile relaxes independently.

use glam::DVec3;
use tracing::debug;

use forma_graph::generators::poisson_points;
use forma_graph::{LatticeGraph, Spring};
use forma_math::geometry::in_bounds;
use forma_math::Sampler;
use forma_physics::{Scope, Simulation};
use forma_types::constants::MIN_REST;
use forma_types::{ContainerId, MassId, SpringId};

use super::{measure, shift_mass, MassDisplacer, TileStrategy};
use crate::spring_force_on;

/// Per-tile scratch structure for one localized trial.
#[derive(Debug, Clone, Default)]
pub struct MassGroup {
    /// Interior masses.
    pub group: Vec<MassId>,
    /// Interior masses eligible for displacement.
    pub candidates: Vec<MassId>,
    /// Springs with both endpoints interior.
    pub springs: Vec<SpringId>,
    /// Springs with exactly one endpoint interior.
    pub border: Vec<SpringId>,
    /// Exterior endpoints of border springs.
    pub outside: Vec<MassId>,
    /// Interior endpoints of border springs; frozen during trials.
    pub edge: Vec<MassId>,

    /// Trial state.
    pub displaced: Option<MassId>,
    pub dx: DVec3,
    pub orig_metric: f64,
    pub test_metric: f64,
}

/// A trench spring saved for re-creation: template plus endpoints, and
/// the container it belonged to (replica modes).
#[derive(Debug, Clone)]
pub struct SavedTrench {
    pub template: Spring,
    pub left: MassId,
    pub right: MassId,
    pub owner: Option<ContainerId>,
}

/// Window downshift applied when classifying masses into tiles, so a
/// joint sitting exactly on an interior boundary lands in the upper
/// tile.
const BOUNDS_SHRINK: f64 = 1.0e-2;

/// Computes the span of tile `i` of `n` along one axis.
///
/// The first tile is two units long (minus the offset), interior tiles
/// are one unit, the second-to-last absorbs the remainder, and the last
/// is discarded; spans under three units form a single tile. Terminal
/// tiles overhang by twice the classification shrink so the max face
/// stays covered.
pub fn tile_span(n: usize, i: usize, unit: f64, offset: f64, min: f64) -> Option<(f64, f64)> {
    let overhang = 2.0 * BOUNDS_SHRINK;
    if n < 3 {
        if i == 0 {
            Some((min, min + 3.0 * unit + overhang))
        } else {
            None
        }
    } else if i == 0 {
        Some((min, min + 2.0 * unit - offset))
    } else if i == n - 1 {
        None
    } else if i == n - 2 {
        Some((
            min + (i as f64 + 1.0) * unit - offset,
            min + (i as f64 + 3.0) * unit + overhang,
        ))
    } else {
        Some((
            min + (i as f64 + 1.0) * unit - offset,
            min + (i as f64 + 2.0) * unit - offset,
        ))
    }
}

/// Classifies the springs of one id set into a mass group bounded by
/// `[minc, maxc)`. Bounds are nudged down slightly so lattice joints
/// sitting exactly on a face classify consistently.
pub fn create_mass_group(
    graph: &LatticeGraph,
    spring_ids: &[SpringId],
    minc: DVec3,
    maxc: DVec3,
) -> MassGroup {
    let minc = minc - DVec3::splat(BOUNDS_SHRINK);
    let maxc = maxc - DVec3::splat(BOUNDS_SHRINK);

    let mut mg = MassGroup::default();
    for &sid in spring_ids {
        let s = graph.spring(sid);
        let left_in = in_bounds(graph.mass(s.left).pos, minc, maxc);
        let right_in = in_bounds(graph.mass(s.right).pos, minc, maxc);
        if left_in && right_in {
            mg.springs.push(sid);
            push_unique(&mut mg.group, s.left);
            push_unique(&mut mg.group, s.right);
        } else if left_in {
            mg.border.push(sid);
            push_unique(&mut mg.edge, s.left);
            push_unique(&mut mg.outside, s.right);
        } else if right_in {
            mg.border.push(sid);
            push_unique(&mut mg.edge, s.right);
            push_unique(&mut mg.outside, s.left);
        }
    }

    for &m in &mg.group {
        let mass = graph.mass(m);
        if mass.is_candidate() && !mg.edge.contains(&m) {
            mg.candidates.push(m);
        }
    }
    mg
}

fn push_unique(list: &mut Vec<MassId>, id: MassId) {
    if !list.contains(&id) {
        list.push(id);
    }
}

/// Cuts the simulation's bounding box into cubic tiles of side `unit`
/// (shifted by `offset`) and builds one mass group per tile with
/// displaceable candidates. Returns the groups and the deduplicated
/// trench set.
pub fn create_mass_tiles(
    sim: &Simulation,
    unit: f64,
    offset: DVec3,
) -> (Vec<MassGroup>, Vec<SpringId>) {
    let (min, max) = sim.graph.bounding_box();
    let span = max - min;
    let mut n = [
        (span.x / unit).ceil() as usize,
        (span.y / unit).ceil() as usize,
        (span.z / unit).ceil() as usize,
    ];
    for c in n.iter_mut() {
        if *c > 1 {
            *c -= 1;
        }
    }
    debug!(nx = n[0], ny = n[1], nz = n[2], "tile grid");

    let spring_ids = sim.graph.spring_ids();
    let mut groups = Vec::new();
    let mut trench: Vec<SpringId> = Vec::new();

    for x in 0..n[0] {
        let Some((xs, xe)) = tile_span(n[0], x, unit, offset.x, min.x) else {
            continue;
        };
        for y in 0..n[1] {
            let Some((ys, ye)) = tile_span(n[1], y, unit, offset.y, min.y) else {
                continue;
            };
            for z in 0..n[2] {
                let Some((zs, ze)) = tile_span(n[2], z, unit, offset.z, min.z) else {
                    continue;
                };
                let mg = create_mass_group(
                    &sim.graph,
                    &spring_ids,
                    DVec3::new(xs, ys, zs),
                    DVec3::new(xe, ye, ze),
                );
                if !mg.candidates.is_empty() {
                    for &b in &mg.border {
                        if !trench.contains(&b) {
                            trench.push(b);
                        }
                    }
                    groups.push(mg);
                }
            }
        }
    }

    debug!(groups = groups.len(), trench = trench.len(), "mass tiles");
    (groups, trench)
}

/// Builds mass groups around Poisson-disc cluster centers at least
/// `unit` apart; springs crossing clusters form the trench.
pub fn create_mass_clusters(
    sim: &Simulation,
    unit: f64,
    sampler: &mut Sampler,
) -> (Vec<MassGroup>, Vec<SpringId>) {
    let (min, max) = sim.graph.bounding_box();
    let centers = poisson_points(min, max, unit, sampler);
    debug!(centers = centers.len(), "cluster centers");

    let mut groups: Vec<MassGroup> = vec![MassGroup::default(); centers.len()];
    let assign = |pos: DVec3| -> usize {
        let mut best = 0;
        let mut best_d = f64::MAX;
        for (i, &c) in centers.iter().enumerate() {
            let d = (c - pos).length();
            if d < best_d {
                best_d = d;
                best = i;
            }
        }
        best
    };

    let mut owner: Vec<(MassId, usize)> = Vec::new();
    for (id, m) in sim.graph.masses() {
        let g = assign(m.pos);
        groups[g].group.push(id);
        owner.push((id, g));
    }
    let group_of = |id: MassId, owner: &[(MassId, usize)]| {
        owner
            .iter()
            .find(|(m, _)| *m == id)
            .map(|&(_, g)| g)
            .expect("assigned mass")
    };

    let mut trench = Vec::new();
    for (sid, s) in sim.graph.springs() {
        let gl = group_of(s.left, &owner);
        let gr = group_of(s.right, &owner);
        if gl != gr {
            trench.push(sid);
            groups[gl].border.push(sid);
            groups[gr].border.push(sid);
            push_unique(&mut groups[gl].edge, s.left);
            push_unique(&mut groups[gr].edge, s.right);
        } else {
            groups[gl].springs.push(sid);
        }
    }

    for mg in groups.iter_mut() {
        for &m in &mg.group {
            let mass = sim.graph.mass(m);
            if mass.is_candidate() && !mg.edge.contains(&m) {
                mg.candidates.push(m);
            }
        }
    }

    groups.retain(|mg| !mg.group.is_empty() && !mg.candidates.is_empty());
    (groups, trench)
}

/// Severs the trench: folds each trench spring's current force into its
/// interior edge masses as a permanent external load, then deletes the
/// springs, saving templates for re-creation.
pub fn split_mass_tiles(
    sim: &mut Simulation,
    groups: &[MassGroup],
    trench: &[SpringId],
    owners: Option<&[ContainerId]>,
) -> Vec<SavedTrench> {
    for mg in groups {
        for &m in &mg.edge {
            if sim.graph.mass(m).fixed {
                continue;
            }
            let mut transfer = DVec3::ZERO;
            for &t in &mg.border {
                if sim.graph.spring(t).touches(m) {
                    transfer += spring_force_on(sim, t, m);
                }
            }
            let mass = sim.graph.mass_mut(m);
            mass.extforce += transfer;
            mass.extduration = f64::INFINITY;
        }
    }

    let mut saved = Vec::with_capacity(trench.len());
    for (i, &t) in trench.iter().enumerate() {
        let s = sim.graph.spring(t);
        saved.push(SavedTrench {
            template: s.clone(),
            left: s.left,
            right: s.right,
            owner: owners.map(|o| o[i]),
        });
        sim.delete_spring(t);
    }
    saved
}

/// Re-creates the trench from saved templates. A re-connection whose new
/// rest length would collapse rejects the accepted shift that caused it
/// (the shift is undone and removed from `accepted`), then reconnects at
/// the original rest.
pub fn combine_mass_tiles(
    sim: &mut Simulation,
    saved: &[SavedTrench],
    accepted: &mut Vec<(MassId, DVec3)>,
) -> Vec<SpringId> {
    let mut recreated = Vec::with_capacity(saved.len());
    for st in saved {
        let mut rest =
            (sim.graph.mass(st.left).origpos - sim.graph.mass(st.right).origpos).length();
        if rest < MIN_REST {
            if let Some(i) = accepted
                .iter()
                .position(|&(m, _)| m == st.left || m == st.right)
            {
                let (m, dx) = accepted.remove(i);
                shift_mass(sim, m, -dx);
                debug!(mass = m.0, "trench re-creation rejected a shift");
                rest = (sim.graph.mass(st.left).origpos - sim.graph.mass(st.right).origpos)
                    .length();
            }
            if rest < MIN_REST {
                rest = st.template.rest;
            }
        }
        let spring = Spring::from_template(&st.template, st.left, st.right, rest);
        let sid = sim.insert_spring(spring);
        if let Some(owner) = st.owner {
            sim.graph.container_mut(owner).add_spring(sid);
        }
        recreated.push(sid);
    }
    recreated
}

impl MassDisplacer {
    /// Tiled trial: sever the trench, relax the partitioned structure,
    /// probe one candidate per tile, accept each tile's probe on local
    /// improvement, reconnect.
    pub fn displace_group_mass(&mut self, sim: &mut Simulation, sampler: &mut Sampler) -> usize {
        sim.sync_up();

        let (groups, trench) = match self.config.tile_strategy {
            TileStrategy::Grid => create_mass_tiles(sim, self.config.unit, self.grid_offset),
            TileStrategy::Cluster => create_mass_clusters(sim, self.config.unit, sampler),
        };
        if groups.is_empty() {
            return 0;
        }
        let mut groups = groups;

        // Global snapshot: positions and loads survive the partition
        let pos_snap: Vec<(MassId, DVec3, DVec3, f64)> = sim
            .graph
            .masses()
            .map(|(id, m)| (id, m.pos, m.extforce, m.extduration))
            .collect();

        let saved = split_mass_tiles(sim, &groups, &trench, None);
        sim.sync_down();
        self.relax_or_settle(sim);

        let mut accepted: Vec<(MassId, DVec3)> = Vec::new();
        let mut result = 0usize;
        let mut attempts = 0u32;

        while result == 0 {
            if attempts > 50 {
                // Give up on this tiling; the driver retries with the
                // next equilibrium.
                result += 1;
                break;
            }

            for mg in groups.iter_mut() {
                mg.displaced = None;
                if mg.candidates.is_empty() {
                    continue;
                }
                mg.orig_metric = measure(sim, Scope::Springs(&mg.springs));

                let target = mg.candidates[sampler.index(mg.candidates.len())];
                let dx = self.dx * sampler.direction();
                if shift_mass(sim, target, dx) {
                    mg.displaced = Some(target);
                    mg.dx = dx;
                }
            }
            sim.sync_down();
            self.relax_or_settle(sim);

            for mg in groups.iter_mut() {
                let Some(target) = mg.displaced else {
                    continue;
                };
                mg.test_metric = measure(sim, Scope::Springs(&mg.springs));
                debug!(
                    orig = mg.orig_metric,
                    test = mg.test_metric,
                    "tile trial"
                );

                // Undo in place; improvements are re-applied below
                shift_mass(sim, target, -mg.dx);
                if mg.test_metric < mg.orig_metric {
                    accepted.push((target, mg.dx));
                    result += 1;
                }
            }
            attempts += 1;
        }

        for &(m, dx) in &accepted {
            shift_mass(sim, m, dx);
        }

        combine_mass_tiles(sim, &saved, &mut accepted);

        // Positions and loads return to the pre-partition state; only
        // original positions, rests, and stiffnesses persist.
        for &(id, pos, extforce, extduration) in &pos_snap {
            let m = sim.graph.mass_mut(id);
            m.pos = pos;
            m.extforce = extforce;
            m.extduration = extduration;
            m.vel = DVec3::ZERO;
        }
        sim.sync_down();

        accepted.len().max(result.min(1))
    }
}
