//! Integration tests for forma-io.

use forma_io::{
    read_design_str, LatticeFill, OptimizationMethod, StopMetric,
};
use glam::DVec3;

const DESIGN: &str = r#"{
  "dml": {
    "version": "1.0",
    "units": "m",
    "volumes": [
      { "id": "beam", "primitive": "box", "url": "0,0,0; 0.4,0.2,0.2", "color": "0.8,0.8,0.8", "alpha": 1.0 },
      { "id": "wall", "primitive": "box", "url": "0,0,0; 0.01,0.2,0.2" },
      { "id": "tip", "primitive": "box", "url": "0.39,0,0; 0.4,0.2,0.2" }
    ],
    "materials": [
      { "id": "alu", "name": "aluminum", "elasticity": "70e9 Pa", "yield": "95e6 Pa", "density": "2700 kg/m3" }
    ],
    "loadcases": [
      {
        "id": "bend",
        "anchors": [ { "volume": "wall" } ],
        "forces": [ { "volume": "tip", "magnitude": "0,-1,0", "duration": -1.0, "vary": "0,0,0" } ]
      }
    ],
    "simulations": [
      {
        "id": "sim1",
        "volume": "beam",
        "lattice": { "fill": "cubic", "unit": "0.1,0.1,0.1", "bardiam": "0.002,0.002,0.002", "material": "alu" },
        "damping": { "velocity": 0.995 },
        "global": { "acceleration": "0,0,0" },
        "load": "bend",
        "repeat": { "after": "optimize", "rotation": "random" }
      }
    ],
    "optimization": {
      "simulation": "sim1",
      "rules": [ { "method": "remove_low_stress", "threshold": "5%", "frequency": 100 } ],
      "stops": [ { "metric": "weight", "threshold": "60%" } ]
    }
  }
}"#;

// ─── Reader Tests ─────────────────────────────────────────────

#[test]
fn full_design_round_trip() {
    let design = read_design_str(DESIGN).unwrap();

    assert_eq!(design.version, "1.0");
    assert_eq!(design.volumes.len(), 3);
    assert_eq!(design.materials.len(), 1);
    assert_eq!(design.loadcases.len(), 1);
    assert_eq!(design.simulations.len(), 1);

    let m = &design.materials[0];
    assert_eq!(m.elasticity, 70e9);
    assert_eq!(m.elasticity_units.as_deref(), Some("Pa"));
    assert_eq!(m.density, 2700.0);

    let lc = &design.loadcases[0];
    assert_eq!(lc.forces[0].magnitude, DVec3::new(0.0, -1.0, 0.0));
    assert_eq!(lc.forces[0].duration, f64::INFINITY);
    assert_eq!(lc.total_duration, f64::INFINITY);

    let sim = &design.simulations[0];
    assert_eq!(sim.lattice.fill, LatticeFill::Cubic);
    assert_eq!(sim.lattice.unit, DVec3::splat(0.1));
    assert_eq!(sim.damping.velocity, 0.995);
    assert_eq!(sim.load_queue, vec![0]);
    assert!(sim.repeat.rotation.is_none()); // "random"
    assert!(sim.repeat.after < 0.0); // "optimize"

    let opt = design.optimization.as_ref().unwrap();
    assert_eq!(opt.simulation, Some(0));
    assert_eq!(opt.rules[0].method, OptimizationMethod::RemoveLowStress);
    assert_eq!(opt.rules[0].threshold, 0.05);
    assert_eq!(opt.rules[0].frequency, 100);
    assert_eq!(opt.stop_criteria[0].metric, StopMetric::Weight);
    assert_eq!(opt.stop_criteria[0].threshold, 0.6);
}

#[test]
fn cross_references_resolve_to_indices() {
    let design = read_design_str(DESIGN).unwrap();
    let lc = &design.loadcases[0];
    assert_eq!(lc.anchors[0].volume, Some(1));
    assert_eq!(lc.forces[0].volume, Some(2));
    assert_eq!(design.simulations[0].volume, Some(0));
    assert_eq!(design.simulations[0].lattice.material, Some(0));
}

#[test]
fn wrong_version_is_rejected() {
    let bad = DESIGN.replace("\"version\": \"1.0\"", "\"version\": \"2.0\"");
    assert!(read_design_str(&bad).is_err());
}

#[test]
fn missing_root_is_rejected() {
    assert!(read_design_str("{ \"xml\": {} }").is_err());
    assert!(read_design_str("not json at all").is_err());
}

#[test]
fn unknown_reference_stays_unresolved() {
    let broken = DESIGN.replace("{ \"volume\": \"wall\" }", "{ \"volume\": \"ceiling\" }");
    let design = read_design_str(&broken).unwrap();
    // Parsing continues; the dangling anchor is simply unresolved
    assert_eq!(design.loadcases[0].anchors[0].volume, None);
    assert_eq!(design.loadcases[0].anchors[0].volume_id, "ceiling");
}

#[test]
fn load_queue_accepts_an_array() {
    let queued = DESIGN.replace("\"load\": \"bend\"", "\"load\": [\"bend\", \"bend\"]");
    let design = read_design_str(&queued).unwrap();
    assert_eq!(design.simulations[0].load_queue, vec![0, 0]);
}

#[test]
fn malformed_vectors_default_to_zero() {
    let mangled = DESIGN.replace("\"unit\": \"0.1,0.1,0.1\"", "\"unit\": \"lots\"");
    let design = read_design_str(&mangled).unwrap();
    assert_eq!(design.simulations[0].lattice.unit, DVec3::ZERO);
}
