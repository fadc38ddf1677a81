//! Integration tests for forma-physics.
//!
//! Scenario: a 2×2×2-cell cubic lattice (27 masses, 54 springs), one
//! face anchored, the opposite face loaded downward.

use forma_graph::generators::cubic_lattice;
use forma_graph::BarParams;
use forma_physics::metrics::{deflection, relax, settle, total_energy, total_length};
use forma_physics::{PhysicsParams, Scope, Simulation};
use forma_types::MassId;
use glam::DVec3;

const UNIT: f64 = 0.1;

fn anchored_loaded_lattice() -> (Simulation, Vec<MassId>) {
    let bar = BarParams::default();
    let mut graph = cubic_lattice(DVec3::ZERO, [2, 2, 2], UNIT, &bar);

    // Anchor the x = 0 face, load the x = 2·unit face
    let mut loaded = Vec::new();
    for id in graph.mass_ids() {
        let x = graph.mass(id).pos.x;
        if x < 0.5 * UNIT {
            graph.mass_mut(id).fix();
        } else if x > 1.5 * UNIT {
            loaded.push(id);
        }
    }
    let per_mass = DVec3::new(0.0, -1.0, 0.0) / loaded.len() as f64;
    for &id in &loaded {
        let m = graph.mass_mut(id);
        m.extforce = per_mass;
        m.extduration = f64::INFINITY;
    }

    let sim = Simulation::new(graph, PhysicsParams::default());
    (sim, loaded)
}

// ─── Scenario A ───────────────────────────────────────────────

#[test]
fn loaded_lattice_stores_energy_and_deflects() {
    let (mut sim, loaded) = anchored_loaded_lattice();
    relax(&mut sim, 1000, &[]);

    assert!(total_energy(&sim, Scope::All) > 0.0);
    assert!(deflection(&sim, &loaded) > 0.0);
}

// ─── Sync Contract Tests ──────────────────────────────────────

#[test]
fn sync_up_populates_spring_forces() {
    let (mut sim, _) = anchored_loaded_lattice();
    relax(&mut sim, 200, &[]);

    let stressed = sim.graph.springs().filter(|(_, s)| s.force.abs() > 0.0).count();
    assert!(stressed > 0);
    let max_seen = sim
        .graph
        .springs()
        .map(|(_, s)| s.max_stress)
        .fold(0.0f64, f64::max);
    assert!(max_seen > 0.0);
}

#[test]
fn host_mutation_reaches_device_after_sync_down() {
    let (mut sim, _) = anchored_loaded_lattice();
    relax(&mut sim, 100, &[]);

    // Stiffen every spring on the host, push, and keep relaxing: the
    // structure must deflect less than the soft variant did.
    let soft_energy = total_energy(&sim, Scope::All);
    for (_, s) in sim.graph.springs_mut() {
        s.k *= 10.0;
    }
    sim.sync_down();
    relax(&mut sim, 2000, &[]);
    let stiff_energy = total_energy(&sim, Scope::All);
    assert!(stiff_energy < soft_energy * 10.0);
}

// ─── Metrics Tests ────────────────────────────────────────────

#[test]
fn total_length_matches_lattice() {
    let (sim, _) = anchored_loaded_lattice();
    assert!((total_length(&sim, Scope::All) - 54.0 * UNIT).abs() < 1e-9);
}

#[test]
fn container_scope_equals_all_for_root() {
    let (mut sim, _) = anchored_loaded_lattice();
    relax(&mut sim, 200, &[]);
    let all = total_energy(&sim, Scope::All);
    let root = total_energy(&sim, Scope::Container(forma_types::ContainerId(0)));
    assert!((all - root).abs() < 1e-12);
}

#[test]
fn settle_terminates_and_counts_windows() {
    let (mut sim, _) = anchored_loaded_lattice();
    let windows = settle(&mut sim, 1e-4, None);
    assert!(windows > 0);
}

#[test]
fn tracked_relax_emits_rows_per_step() {
    let (mut sim, loaded) = anchored_loaded_lattice();
    let samples = relax(&mut sim, 25, &loaded[..2]);
    // One sample per tracked mass before the first step and after each
    assert_eq!(samples.len(), 26 * 2);
    assert!(samples.iter().all(|s| s.index < 2));
}
