//! Replica populations.
//!
//! A population is a set of deep copies of the root container, living in
//! the same arenas and advanced by the same integrator. Each replica
//! probes one independent relocation per iteration, so a single
//! relaxation prices `pop_size` candidate moves at once.
//!
//! The split-population variant additionally tiles every replica and
//! accepts at most one improving probe per tile row.

use std::collections::HashMap;

use glam::DVec3;
use tracing::debug;

use forma_math::Sampler;
use forma_physics::{Scope, Simulation};
use forma_types::{ContainerId, MassId};

use super::groups::{combine_mass_tiles, create_mass_group, split_mass_tiles, tile_span, MassGroup};
use super::{measure, shift_container_mass, MassDisplacer};

/// Deep-copies the root container `size` times. Replica masses and
/// springs are fresh arena entries; replica spring endpoints map to the
/// replica's own masses by position in the container list.
pub fn create_population(
    sim: &mut Simulation,
    orig: ContainerId,
    size: usize,
) -> Vec<ContainerId> {
    let orig_masses = sim.graph.container(orig).masses.clone();
    let orig_springs = sim.graph.container(orig).springs.clone();

    let index_of: HashMap<MassId, usize> = orig_masses
        .iter()
        .enumerate()
        .map(|(i, &m)| (m, i))
        .collect();

    let mut population = Vec::with_capacity(size);
    for _ in 0..size {
        let copy = sim.create_container();
        let mut copy_masses = Vec::with_capacity(orig_masses.len());
        for &mid in &orig_masses {
            let mut m = sim.graph.mass(mid).clone();
            m.spring_count = 0;
            let nid = sim.graph.add_mass(m);
            sim.graph.container_mut(copy).add_mass(nid);
            copy_masses.push(nid);
        }
        for &sid in &orig_springs {
            let mut s = sim.graph.spring(sid).clone();
            s.left = copy_masses[index_of[&s.left]];
            s.right = copy_masses[index_of[&s.right]];
            let nid = sim.graph.add_spring(s);
            sim.graph.container_mut(copy).add_spring(nid);
        }
        population.push(copy);
    }
    sim.mark_dirty();
    debug!(size, "population created");
    population
}

/// Picks a candidate index within a container, or `None` when the
/// container has no candidate.
fn pick_container_candidate(
    sim: &Simulation,
    container: ContainerId,
    sampler: &mut Sampler,
) -> Option<usize> {
    let masses = &sim.graph.container(container).masses;
    if !masses.iter().any(|&m| sim.graph.mass(m).is_candidate()) {
        return None;
    }
    loop {
        let i = sampler.index(masses.len());
        if sim.graph.mass(masses[i]).is_candidate() {
            return Some(i);
        }
    }
}

impl MassDisplacer {
    /// Population trial: one probe per replica, one shared relaxation,
    /// first improving replica wins and is broadcast everywhere.
    pub fn displace_pop_mass(&mut self, sim: &mut Simulation, sampler: &mut Sampler) -> bool {
        sim.sync_up();
        let orig = ContainerId(0);
        let baseline = measure(sim, Scope::Container(orig));

        let mut probes: Vec<Option<(usize, DVec3)>> = Vec::with_capacity(self.population().len());
        for p in 0..self.population().len() {
            let copy = self.population()[p];
            let probe = pick_container_candidate(sim, copy, sampler).and_then(|i| {
                let dx = self.dx * sampler.direction();
                shift_container_mass(sim, copy, i, dx).then_some((i, dx))
            });
            probes.push(probe);
        }
        sim.sync_down();

        self.relax_or_settle(sim);

        let mut winner: Option<(usize, usize, DVec3)> = None;
        for p in 0..self.population().len() {
            let Some((i, dx)) = probes[p] else {
                continue;
            };
            let trial = measure(sim, Scope::Container(self.population()[p]));
            debug!(baseline, trial, replica = p, "population trial");
            if trial < baseline {
                winner = Some((p, i, dx));
                break;
            }
        }

        match winner {
            Some((p, i, dx)) => {
                let copy = self.population()[p];
                shift_container_mass(sim, orig, i, dx);

                // Carry the winner's relaxed state onto the original
                let orig_masses = sim.graph.container(orig).masses.clone();
                let copy_masses = sim.graph.container(copy).masses.clone();
                for (o, c) in orig_masses.iter().zip(copy_masses.iter()) {
                    let (pos, vel) = {
                        let cm = sim.graph.mass(*c);
                        (cm.pos, cm.vel)
                    };
                    let om = sim.graph.mass_mut(*o);
                    om.pos = pos;
                    om.vel = vel;
                }

                for p1 in 0..self.population().len() {
                    let c = self.population()[p1];
                    if p1 != p {
                        shift_container_mass(sim, c, i, dx);
                        if let Some((i1, dx1)) = probes[p1] {
                            shift_container_mass(sim, c, i1, -dx1);
                        }
                    }
                }
                sim.sync_down();
                true
            }
            None => {
                for p in 0..self.population().len() {
                    if let Some((i, dx)) = probes[p] {
                        shift_container_mass(sim, self.population()[p], i, -dx);
                    }
                }
                sim.sync_down();
                false
            }
        }
    }

    /// Split-population trial: tile every replica, probe each tile of
    /// each replica, accept at most one improving probe per tile row.
    pub fn displace_split_pop_mass(&mut self, sim: &mut Simulation, sampler: &mut Sampler) -> usize {
        sim.sync_up();
        let orig = ContainerId(0);
        let pop: Vec<ContainerId> = self.population().to_vec();

        let (groups, trench, owners) = self.tile_population(sim, &pop);
        if groups.is_empty() {
            return 0;
        }
        let mut groups = groups;
        let rows = groups.len() / pop.len();

        let extforce_snap: Vec<(MassId, DVec3, f64)> = sim
            .graph
            .masses()
            .map(|(id, m)| (id, m.extforce, m.extduration))
            .collect();

        let saved = split_mass_tiles(sim, &groups, &trench, Some(&owners));
        sim.sync_down();
        self.relax_or_settle(sim);

        // Baselines and probes, one per group
        for mg in groups.iter_mut() {
            mg.displaced = None;
            if mg.candidates.is_empty() {
                continue;
            }
            mg.orig_metric = measure(sim, Scope::Springs(&mg.springs));
            let target = mg.candidates[sampler.index(mg.candidates.len())];
            let dx = self.dx * sampler.direction();
            if super::shift_mass(sim, target, dx) {
                mg.displaced = Some(target);
                mg.dx = dx;
            }
        }
        sim.sync_down();
        self.relax_or_settle(sim);

        let mut n = 0usize;
        let mut accepted: Vec<(MassId, DVec3)> = Vec::new();
        for row in 0..rows {
            let mut row_winner: Option<(usize, DVec3)> = None;
            for (p, &con) in pop.iter().enumerate() {
                let mg = &mut groups[row * pop.len() + p];
                let Some(target) = mg.displaced else {
                    continue;
                };
                mg.test_metric = measure(sim, Scope::Springs(&mg.springs));
                if mg.test_metric < mg.orig_metric && row_winner.is_none() {
                    let index = sim
                        .graph
                        .container(con)
                        .masses
                        .iter()
                        .position(|&m| m == target)
                        .expect("displaced mass belongs to its replica");
                    row_winner = Some((index, mg.dx));
                }
                super::shift_mass(sim, target, -mg.dx);
            }

            if let Some((index, dx)) = row_winner {
                shift_container_mass(sim, orig, index, dx);
                accepted.push((sim.graph.container(orig).masses[index], dx));
                for &con in &pop {
                    shift_container_mass(sim, con, index, dx);
                }
                n += 1;
            }
        }

        // Re-align replica state with the original
        let orig_masses = sim.graph.container(orig).masses.clone();
        for &con in &pop {
            let copy_masses = sim.graph.container(con).masses.clone();
            for (o, c) in orig_masses.iter().zip(copy_masses.iter()) {
                let (pos, vel, extforce) = {
                    let om = sim.graph.mass(*o);
                    (om.pos, om.vel, om.extforce)
                };
                let cm = sim.graph.mass_mut(*c);
                cm.pos = pos;
                cm.vel = vel;
                cm.extforce = extforce;
            }
        }

        combine_mass_tiles(sim, &saved, &mut accepted);
        for &(id, extforce, extduration) in &extforce_snap {
            let m = sim.graph.mass_mut(id);
            m.extforce = extforce;
            m.extduration = extduration;
        }
        sim.sync_down();
        n
    }

    /// Tiles every replica with the same grid. Returns groups laid out
    /// row-major (`groups[row * pop_size + p]`), the full trench, and
    /// each trench spring's owning container.
    fn tile_population(
        &self,
        sim: &Simulation,
        pop: &[ContainerId],
    ) -> (Vec<MassGroup>, Vec<forma_types::SpringId>, Vec<ContainerId>) {
        let (min, max) = sim.graph.bounding_box();
        let span = max - min;
        let unit = self.config.unit;
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

        let mut groups = Vec::new();
        let mut trench = Vec::new();
        let mut owners = Vec::new();

        for x in 0..n[0] {
            let Some((xs, xe)) = tile_span(n[0], x, unit, self.grid_offset.x, min.x) else {
                continue;
            };
            for y in 0..n[1] {
                let Some((ys, ye)) = tile_span(n[1], y, unit, self.grid_offset.y, min.y) else {
                    continue;
                };
                for z in 0..n[2] {
                    let Some((zs, ze)) = tile_span(n[2], z, unit, self.grid_offset.z, min.z)
                    else {
                        continue;
                    };
                    let minc = DVec3::new(xs, ys, zs);
                    let maxc = DVec3::new(xe, ye, ze);

                    let row: Vec<MassGroup> = pop
                        .iter()
                        .map(|&con| {
                            create_mass_group(
                                &sim.graph,
                                &sim.graph.container(con).springs,
                                minc,
                                maxc,
                            )
                        })
                        .collect();
                    if row.iter().any(|mg| mg.candidates.is_empty()) {
                        continue;
                    }
                    for (p, mg) in row.iter().enumerate() {
                        for &b in &mg.border {
                            if !trench.contains(&b) {
                                trench.push(b);
                                owners.push(pop[p]);
                            }
                        }
                    }
                    groups.extend(row);
                }
            }
        }

        (groups, trench, owners)
    }

    fn population(&self) -> &[ContainerId] {
        &self.population
    }
}
