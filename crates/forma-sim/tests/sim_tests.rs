//! Integration tests for forma-sim.
//!
//! Drives the full loop: lattice → loads → driver → stop → export.

use std::path::PathBuf;

use forma_graph::generators::cubic_lattice;
use forma_graph::BarParams;
use forma_io::{OptimizationMethod, OptimizationRule, OptimizationStop, StopMetric};
use forma_optimize::{DisplacementMode, MassDisplacerConfig};
use forma_physics::{PhysicsParams, Simulation};
use forma_sim::{DriverConfig, ResolvedForce, ResolvedLoadcase, SimStatus, Simulator};
use forma_telemetry::{CsvSink, EventBus};
use forma_types::MassId;
use glam::DVec3;

const UNIT: f64 = 0.1;

/// 2×2×2-cell lattice with face masses split into anchor and load sets.
fn lattice_with_faces() -> (Simulation, Vec<MassId>, Vec<MassId>) {
    let graph = cubic_lattice(DVec3::ZERO, [2, 2, 2], UNIT, &BarParams::default());
    let sim = Simulation::new(graph, PhysicsParams::default());
    let mut anchors = Vec::new();
    let mut loaded = Vec::new();
    for (id, m) in sim.graph.masses() {
        if m.pos.x < 0.5 * UNIT {
            anchors.push(id);
        } else if m.pos.x > 1.5 * UNIT {
            loaded.push(id);
        }
    }
    (sim, anchors, loaded)
}

fn bending_load(anchors: &[MassId], loaded: &[MassId], duration: f64) -> ResolvedLoadcase {
    ResolvedLoadcase {
        anchors: vec![anchors.to_vec()],
        forces: vec![ResolvedForce {
            masses: loaded.to_vec(),
            magnitude: DVec3::new(0.0, -1.0, 0.0),
            duration,
            vary: DVec3::ZERO,
        }],
        total_duration: duration,
    }
}

fn temp_data_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("forma_sim_{tag}"));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn bus_for(dir: &PathBuf) -> EventBus {
    let mut bus = EventBus::new();
    bus.add_sink(Box::new(CsvSink::new(dir).unwrap()));
    bus
}

// ─── Scenario E: weight stop drives removal to 60% ────────────

#[test]
fn weight_stop_halts_the_remover_and_exports() {
    let (sim, anchors, loaded) = lattice_with_faces();
    let dir = temp_data_dir("weight_stop");

    // The bending load never expires, so the queue never reports done;
    // explicit repeat scheduling lets the frequency rule fire anyway
    let config = DriverConfig {
        data_dir: dir.clone(),
        repeat_after_explicit: true,
        rules: vec![OptimizationRule {
            method: OptimizationMethod::RemoveLowStress,
            threshold: 0.05,
            frequency: 100,
        }],
        stop_criteria: vec![OptimizationStop {
            metric: StopMetric::Weight,
            threshold: 0.6,
        }],
        remover_stop_ratio: 0.1,
        ..Default::default()
    };

    let load = bending_load(&anchors, &loaded, f64::INFINITY);
    let mut driver = Simulator::new(sim, config, vec![load], bus_for(&dir));
    driver.run(500);

    assert_eq!(driver.status, SimStatus::Stopped);
    let metrics = driver.metrics();
    assert!(metrics.total_length / metrics.total_length_start <= 0.6);

    // The export worker produced a timestamped STL in the data dir
    assert!(driver.export.take().unwrap().join());
    let stl_count = std::fs::read_dir(&dir)
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().map(|x| x == "stl").unwrap_or(false))
        .count();
    assert_eq!(stl_count, 1);

    // Metric rows were streamed in weight format
    let text = std::fs::read_to_string(dir.join("optMetrics.csv")).unwrap();
    assert!(text.starts_with("Time,Iteration,Deflection,Total Weight,Bar Number\n"));
    assert!(text.lines().count() > 2);

    std::fs::remove_dir_all(&dir).unwrap();
}

// ─── Scenario F: load queue switching ─────────────────────────

#[test]
fn load_queue_switches_and_clears_between_cases() {
    let (sim, anchors, loaded) = lattice_with_faces();
    let dir = temp_data_dir("load_queue");

    let config = DriverConfig {
        data_dir: dir.clone(),
        ..Default::default()
    };

    // First case pulls -y for 1s on the far face; the second pushes +z
    // for 2s on the anchors' opposite corner set
    let first = bending_load(&anchors, &loaded, 1.0);
    let mut second = bending_load(&anchors, &loaded, 2.0);
    second.forces[0].magnitude = DVec3::new(0.0, 0.0, 1.0);

    let mut driver = Simulator::new(sim, config, vec![first, second], bus_for(&dir));
    driver.start();

    driver.tick();
    let per_mass = 1.0 / loaded.len() as f64;
    let f0 = driver.sim.graph.mass(loaded[0]).extforce;
    assert!((f0.y + per_mass).abs() < 1e-12, "first load not applied");

    // Render window is 0.01s; run until just past t = 1.0
    while driver.sim.time() < 1.0 + 0.015 {
        driver.tick();
    }
    let f1 = driver.sim.graph.mass(loaded[0]).extforce;
    assert!(f1.y.abs() < 1e-12, "first load not cleared");
    assert!((f1.z - per_mass).abs() < 1e-12, "second load not applied");

    // Queue exhausts after t = 3.0; forces stay as the last case left
    while driver.sim.time() < 3.0 + 0.015 {
        driver.tick();
    }
    assert_eq!(driver.status, SimStatus::Started);
    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn frequency_rules_wait_for_the_load_queue() {
    let (sim, anchors, loaded) = lattice_with_faces();
    let dir = temp_data_dir("frequency_gate");

    let config = DriverConfig {
        data_dir: dir.clone(),
        rules: vec![OptimizationRule {
            method: OptimizationMethod::RemoveLowStress,
            threshold: 0.05,
            frequency: 100,
        }],
        ..Default::default()
    };

    let first = bending_load(&anchors, &loaded, 1.0);
    let second = bending_load(&anchors, &loaded, 2.0);
    let mut driver = Simulator::new(sim, config, vec![first, second], bus_for(&dir));
    driver.start();

    // Both loadcases are still queued until t = 3.0; the remover must
    // not touch the graph before then
    while driver.sim.time() < 2.9 {
        driver.tick();
    }
    assert!(!driver.load_queue_done());
    assert_eq!(driver.sim.graph.n_springs(), 54);

    while driver.sim.time() < 3.5 {
        driver.tick();
    }
    assert!(driver.load_queue_done());
    assert!(driver.sim.graph.n_springs() < 54);

    std::fs::remove_dir_all(&dir).unwrap();
}

// ─── Stop triggering and optimizer switching ──────────────────

#[test]
fn energy_stop_switches_to_the_remover_then_stops() {
    let (sim, anchors, loaded) = lattice_with_faces();
    let dir = temp_data_dir("energy_switch");

    // Repeats are configured far in the future, so the displacer's
    // equilibrium gate never dispatches it; the energy stop itself
    // switches the driver onto the fallback remover, which then stops.
    let config = DriverConfig {
        data_dir: dir.clone(),
        repeat_after: 1.0e9,
        rules: vec![OptimizationRule {
            method: OptimizationMethod::MassDisplace,
            threshold: 0.2,
            frequency: 0,
        }],
        stop_criteria: vec![OptimizationStop {
            metric: StopMetric::Energy,
            threshold: 10.0,
        }],
        displacer: MassDisplacerConfig {
            mode: DisplacementMode::Single,
            relaxation: 100,
            ..Default::default()
        },
        ..Default::default()
    };

    let load = bending_load(&anchors, &loaded, f64::INFINITY);
    let mut driver = Simulator::new(sim, config, vec![load], bus_for(&dir));
    driver.run(20_000);

    assert_eq!(driver.status, SimStatus::Stopped);
    let metrics = driver.metrics();
    assert!(metrics.total_energy_start > 0.0, "no equilibrium baseline");
    assert!(metrics.total_energy / metrics.total_energy_start <= 10.0);

    if let Some(export) = driver.export.take() {
        export.join();
    }
    std::fs::remove_dir_all(&dir).unwrap();
}

// ─── Repeat rotation ──────────────────────────────────────────

#[test]
fn repeat_resets_positions_with_rotation() {
    let (sim, anchors, loaded) = lattice_with_faces();
    let dir = temp_data_dir("repeat");

    let config = DriverConfig {
        data_dir: dir.clone(),
        repeat_after: 0.05,
        repeat_rotation: Some(DVec3::new(0.25, 0.0, 0.0)),
        ..Default::default()
    };

    let load = bending_load(&anchors, &loaded, f64::INFINITY);
    let mut driver = Simulator::new(sim, config, vec![load], bus_for(&dir));
    driver.start();

    // Past the repeat time, positions jump to rotated originals
    for _ in 0..8 {
        driver.tick();
    }
    driver.sim.sync_up();

    // A quarter turn about x maps the lattice into the z/y plane: the
    // bounding box is preserved in extent but reoriented
    let (min, max) = driver.sim.graph.bounding_box();
    let span = max - min;
    assert!((span.x - 0.2).abs() < 0.05);
    assert!(span.y > 0.15 && span.z > 0.15);
    std::fs::remove_dir_all(&dir).unwrap();
}
