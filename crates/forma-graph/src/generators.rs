//! Procedural lattice generators.
//!
//! Deterministic generators that populate a [`LatticeGraph`] (and its
//! root container) from a bounding box: a cubic nearest-neighbor grid
//! and a Poisson-disc space lattice. Both are sufficient to seed the
//! test scenarios and drive the optimizers; STL-conforming lattice
//! carving is an external concern.

use glam::DVec3;

use forma_math::Sampler;
use forma_types::MassId;

use crate::model::{BarParams, LatticeGraph, Mass, Spring};

/// Generates a cubic lattice of `cells` cells per axis starting at `min`,
/// with nearest-neighbor (axis-aligned) bars of length `unit`.
///
/// A `[2, 2, 2]` lattice has 27 masses and 54 springs.
pub fn cubic_lattice(min: DVec3, cells: [usize; 3], unit: f64, bar: &BarParams) -> LatticeGraph {
    let mut graph = LatticeGraph::new();
    let root = graph.add_container();

    let nx = cells[0] + 1;
    let ny = cells[1] + 1;
    let nz = cells[2] + 1;

    let mut ids = Vec::with_capacity(nx * ny * nz);
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                let pos = min + unit * DVec3::new(x as f64, y as f64, z as f64);
                let id = graph.add_mass(Mass::new(pos, bar.mass));
                graph.container_mut(root).add_mass(id);
                ids.push(id);
            }
        }
    }

    let at = |x: usize, y: usize, z: usize| ids[(x * ny + y) * nz + z];
    for x in 0..nx {
        for y in 0..ny {
            for z in 0..nz {
                if x + 1 < nx {
                    connect(&mut graph, at(x, y, z), at(x + 1, y, z), bar);
                }
                if y + 1 < ny {
                    connect(&mut graph, at(x, y, z), at(x, y + 1, z), bar);
                }
                if z + 1 < nz {
                    connect(&mut graph, at(x, y, z), at(x, y, z + 1), bar);
                }
            }
        }
    }

    graph
}

/// Generates a space lattice: Poisson-disc samples at least `min_cut`
/// apart inside the box, connected wherever two points are closer than
/// `spring_cutoff`.
pub fn space_lattice(
    min: DVec3,
    max: DVec3,
    min_cut: f64,
    spring_cutoff: f64,
    bar: &BarParams,
    sampler: &mut Sampler,
) -> LatticeGraph {
    let points = poisson_points(min, max, min_cut, sampler);

    let mut graph = LatticeGraph::new();
    let root = graph.add_container();

    let ids: Vec<MassId> = points
        .iter()
        .map(|&p| {
            let id = graph.add_mass(Mass::new(p, bar.mass));
            graph.container_mut(root).add_mass(id);
            id
        })
        .collect();

    for i in 0..points.len() {
        for j in (i + 1)..points.len() {
            if (points[i] - points[j]).length() <= spring_cutoff {
                connect(&mut graph, ids[i], ids[j], bar);
            }
        }
    }

    graph
}

/// Perturbs every free mass by a uniform sample in `±jiggle/2` per
/// component, updating original positions and incident rest lengths.
pub fn jiggle_masses(graph: &mut LatticeGraph, jiggle: DVec3, sampler: &mut Sampler) {
    if jiggle == DVec3::ZERO {
        return;
    }
    for id in graph.mass_ids() {
        if graph.mass(id).fixed {
            continue;
        }
        let d = DVec3::new(
            sampler.range(-jiggle.x / 2.0, jiggle.x / 2.0),
            sampler.range(-jiggle.y / 2.0, jiggle.y / 2.0),
            sampler.range(-jiggle.z / 2.0, jiggle.z / 2.0),
        );
        let m = graph.mass_mut(id);
        m.pos += d;
        m.origpos += d;
    }
    for id in graph.spring_ids() {
        let (l, r) = {
            let s = graph.spring(id);
            (s.left, s.right)
        };
        let rest = (graph.mass(l).origpos - graph.mass(r).origpos).length();
        let s = graph.spring_mut(id);
        s.k *= s.rest / rest;
        s.rest = rest;
    }
}

/// Poisson-disc point sampling by greedy farthest-candidate selection.
///
/// Seeds `3 × volume / min_cut³` uniform candidates, then repeatedly
/// promotes the candidate farthest (by accumulated distance) from the
/// chosen set, dropping candidates closer than `min_cut` to the latest
/// pick.
pub fn poisson_points(min: DVec3, max: DVec3, min_cut: f64, sampler: &mut Sampler) -> Vec<DVec3> {
    let span = max - min;
    let volume = span.x * span.y * span.z;
    let n_candidates = ((volume / (min_cut * min_cut * min_cut)).ceil() as usize).max(1) * 3;

    let mut centers = vec![sampler.point(min, max)];
    let mut candidates: Vec<DVec3> = (0..n_candidates).map(|_| sampler.point(min, max)).collect();
    let mut sum_dists = vec![0.0f64; candidates.len()];

    while !candidates.is_empty() {
        let latest = *centers.last().expect("at least one center");
        let mut i_furthest = 0;
        let mut max_sum = 0.0;

        let mut i = 0;
        while i < candidates.len() {
            let l = (latest - candidates[i]).length();
            if l < min_cut {
                candidates.swap_remove(i);
                sum_dists.swap_remove(i);
                continue;
            }
            sum_dists[i] += l;
            if sum_dists[i] > max_sum {
                max_sum = sum_dists[i];
                i_furthest = i;
            }
            i += 1;
        }
        if candidates.is_empty() {
            break;
        }

        centers.push(candidates.swap_remove(i_furthest));
        sum_dists.swap_remove(i_furthest);
    }

    centers
}

fn connect(graph: &mut LatticeGraph, a: MassId, b: MassId, bar: &BarParams) {
    let rest = (graph.mass(a).origpos - graph.mass(b).origpos).length();
    let mut s = Spring::new(a, b, rest, bar.k_unit / rest);
    s.diam = bar.diam;
    s.break_force = bar.break_force;
    let sid = graph.add_spring(s);
    // Root container is always index 0 for generated lattices.
    graph.containers[0].add_spring(sid);
}
