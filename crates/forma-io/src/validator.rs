//! Cross-reference resolution.
//!
//! Ids referenced across the document (anchor → volume, lattice →
//! material, simulation → loadcases, optimization → simulation) resolve
//! to indices into the design's arenas. Unknown ids warn with the
//! offending id and leave the reference `None`; downstream use of an
//! unresolved reference is a warning, never an abort.

use tracing::warn;

use crate::contract::Design;

/// Resolves every cross-reference in place. Returns the number of
/// references that failed to resolve.
pub fn resolve_references(design: &mut Design) -> usize {
    let mut missing = 0;

    let volume_ids: Vec<String> = design.volumes.iter().map(|v| v.id.clone()).collect();
    let material_ids: Vec<String> = design.materials.iter().map(|m| m.id.clone()).collect();
    let loadcase_ids: Vec<String> = design.loadcases.iter().map(|l| l.id.clone()).collect();
    let simulation_ids: Vec<String> = design.simulations.iter().map(|s| s.id.clone()).collect();

    let find = |ids: &[String], id: &str| ids.iter().position(|x| x == id);

    for lc in &mut design.loadcases {
        for anchor in &mut lc.anchors {
            anchor.volume = find(&volume_ids, &anchor.volume_id);
            if anchor.volume.is_none() {
                warn!(volume = %anchor.volume_id, loadcase = %lc.id, "unknown anchor volume");
                missing += 1;
            }
        }
        for force in &mut lc.forces {
            force.volume = find(&volume_ids, &force.volume_id);
            if force.volume.is_none() {
                warn!(volume = %force.volume_id, loadcase = %lc.id, "unknown force volume");
                missing += 1;
            }
        }
    }

    for sim in &mut design.simulations {
        sim.volume = find(&volume_ids, &sim.volume_id);
        if sim.volume.is_none() {
            warn!(volume = %sim.volume_id, simulation = %sim.id, "unknown simulation volume");
            missing += 1;
        }

        if !sim.lattice.material_id.is_empty() {
            sim.lattice.material = find(&material_ids, &sim.lattice.material_id);
            if sim.lattice.material.is_none() {
                warn!(
                    material = %sim.lattice.material_id,
                    simulation = %sim.id,
                    "unknown lattice material"
                );
                missing += 1;
            }
        }

        sim.load_queue.clear();
        for id in &sim.load_queue_ids {
            match find(&loadcase_ids, id) {
                Some(i) => sim.load_queue.push(i),
                None => {
                    warn!(loadcase = %id, simulation = %sim.id, "unknown loadcase in queue");
                    missing += 1;
                }
            }
        }
    }

    if let Some(opt) = &mut design.optimization {
        opt.simulation = find(&simulation_ids, &opt.simulation_id);
        if opt.simulation.is_none() {
            warn!(simulation = %opt.simulation_id, "unknown simulation on optimization");
            missing += 1;
        }
    }

    missing
}
