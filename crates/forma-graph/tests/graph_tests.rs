//! Integration tests for forma-graph.

use forma_graph::generators::cubic_lattice;
use forma_graph::{BarParams, Incidence, LatticeGraph, Mass, Spring};
use glam::DVec3;

// ─── Arena Tests ──────────────────────────────────────────────

#[test]
fn lattice_counts() {
    let g = cubic_lattice(DVec3::ZERO, [2, 2, 2], 0.1, &BarParams::default());
    assert_eq!(g.n_masses(), 27);
    assert_eq!(g.n_springs(), 54);
}

#[test]
fn incidence_matches_counters_after_mutation() {
    let mut g = cubic_lattice(DVec3::ZERO, [2, 2, 2], 0.1, &BarParams::default());
    let mut inc = Incidence::build(&g);
    assert!(inc.consistent_with(&g));

    // Delete a handful of springs, repairing the map each time
    for sid in g.spring_ids().into_iter().take(5) {
        let (l, r) = {
            let s = g.spring(sid);
            (s.left, s.right)
        };
        inc.detach(sid, l, r);
        g.remove_spring(sid);
        assert!(inc.consistent_with(&g));
    }
}

#[test]
fn center_is_box_center() {
    let g = cubic_lattice(DVec3::new(1.0, 2.0, 3.0), [2, 2, 2], 0.1, &BarParams::default());
    let c = g.center();
    assert!((c - DVec3::new(1.1, 2.1, 3.1)).length() < 1e-12);
}

#[test]
fn mass_deletion_prunes_containers() {
    let mut g = LatticeGraph::new();
    let root = g.add_container();
    let a = g.add_mass(Mass::new(DVec3::ZERO, 1.0));
    let b = g.add_mass(Mass::new(DVec3::X, 1.0));
    g.container_mut(root).add_mass(a);
    g.container_mut(root).add_mass(b);

    g.remove_mass(a);
    assert_eq!(g.container(root).masses, vec![b]);
    assert_eq!(g.n_masses(), 1);
}

#[test]
fn repoint_keeps_counters() {
    let mut g = LatticeGraph::new();
    let a = g.add_mass(Mass::new(DVec3::ZERO, 1.0));
    let b = g.add_mass(Mass::new(DVec3::X, 1.0));
    let c = g.add_mass(Mass::new(DVec3::Y, 1.0));
    let sid = g.add_spring(Spring::new(a, b, 1.0, 1.0));

    g.repoint_spring(sid, b, c);
    assert_eq!(g.mass(b).spring_count, 0);
    assert_eq!(g.mass(c).spring_count, 1);
    assert_eq!(g.spring(sid).right, c);
}

// ─── Candidate Predicate Tests ────────────────────────────────

#[test]
fn candidate_requires_free_unloaded_connected() {
    let mut g = LatticeGraph::new();
    let a = g.add_mass(Mass::new(DVec3::ZERO, 1.0));
    let b = g.add_mass(Mass::new(DVec3::X, 1.0));
    g.add_spring(Spring::new(a, b, 1.0, 1.0));
    let lone = g.add_mass(Mass::new(DVec3::Y, 1.0));

    assert!(g.mass(a).is_candidate());
    assert!(!g.mass(lone).is_candidate()); // no incident spring

    g.mass_mut(a).fix();
    assert!(!g.mass(a).is_candidate());

    g.mass_mut(b).extforce = DVec3::new(0.0, -1.0, 0.0);
    assert!(!g.mass(b).is_candidate());

    // Forces under the candidate epsilon do not disqualify
    g.mass_mut(b).extforce = DVec3::splat(1.0e-8);
    assert!(g.mass(b).is_candidate());
}
