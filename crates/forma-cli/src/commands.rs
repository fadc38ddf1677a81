//! CLI command implementations.
//!
//! `run` stands in for the full pipeline: design → lattice → driver →
//! export. Volume geometry here is the box primitive (`url` carries
//! `"x0,y0,z0; x1,y1,z1"`); mesh-conforming volumes belong to the
//! external geometry loader.

use std::path::{Path, PathBuf};

use glam::DVec3;
use tracing::{info, warn};

use forma_graph::generators::{cubic_lattice, jiggle_masses, space_lattice};
use forma_graph::{BarParams, LatticeGraph};
use forma_io::{read_design, Design, LatticeFill, SimulationConfig, Volume};
use forma_math::Sampler;
use forma_physics::{PhysicsParams, Simulation};
use forma_telemetry::{CsvSink, EventBus};
use forma_types::{FormaError, FormaResult};

pub fn run(design_path: &str, output: &str, seed: u64, max_ticks: u64) -> FormaResult<()> {
    let design = read_design(Path::new(design_path))?;

    let sim_config = pick_simulation(&design)?;
    let volume = sim_config
        .volume
        .map(|i| &design.volumes[i])
        .ok_or_else(|| FormaError::InvalidDesign("simulation has no resolved volume".into()))?;
    let bounds = volume_box(volume)
        .ok_or_else(|| FormaError::InvalidDesign(format!("volume '{}' is not a box", volume.id)))?;

    let mut sampler = Sampler::from_seed(seed);
    let graph = build_lattice(&design, sim_config, bounds, &mut sampler)?;
    info!(
        masses = graph.n_masses(),
        springs = graph.n_springs(),
        "lattice built"
    );

    let sim = Simulation::new(
        graph,
        PhysicsParams {
            damping: sim_config.damping.velocity,
            gravity: sim_config.acceleration,
            ..Default::default()
        },
    );

    let load_queue = resolve_loads(&design, sim_config, &sim)?;

    let opt = design.optimization.clone().unwrap_or_default();
    let unit = sim_config.lattice.unit.x.max(1.0e-3);
    let mut displacer_config = forma_optimize::MassDisplacerConfig::default();
    displacer_config.displacement = unit * 0.2;
    displacer_config.unit = unit;

    let driver_config = forma_sim::DriverConfig {
        data_dir: PathBuf::from(output),
        repeat_after: sim_config.repeat.after,
        repeat_after_explicit: sim_config.repeat.after_explicit,
        repeat_rotation: sim_config.repeat.rotation,
        rules: opt.rules.clone(),
        stop_criteria: opt.stop_criteria.clone(),
        displacer: displacer_config,
        seed,
        ..Default::default()
    };

    let mut bus = EventBus::new();
    match CsvSink::new(Path::new(output)) {
        Ok(sink) => bus.add_sink(Box::new(sink)),
        Err(e) => warn!(error = %e, "metrics disabled"),
    }

    let mut driver = forma_sim::Simulator::new(sim, driver_config, load_queue, bus);
    driver.run(max_ticks);

    let metrics = driver.metrics();
    info!(
        time = metrics.time,
        bars = metrics.n_bars,
        weight = metrics.total_length,
        iterations = metrics.optimize_iterations,
        "run finished"
    );

    if let Some(export) = driver.export.take() {
        export.join();
    }
    Ok(())
}

pub fn validate(path: &str) -> FormaResult<()> {
    let design = read_design(Path::new(path))?;
    println!(
        "dml {} — {} volumes, {} materials, {} loadcases, {} simulations",
        design.version,
        design.volumes.len(),
        design.materials.len(),
        design.loadcases.len(),
        design.simulations.len()
    );
    Ok(())
}

pub fn inspect(path: &str) -> FormaResult<()> {
    let snap = forma_sim::StateSnapshot::load(Path::new(path))?;
    println!(
        "snapshot at t={:.4}s — {} masses, {} springs, {} containers",
        snap.sim_time,
        snap.graph.n_masses(),
        snap.graph.n_springs(),
        snap.graph.containers.len()
    );
    Ok(())
}

fn pick_simulation(design: &Design) -> FormaResult<&SimulationConfig> {
    if let Some(opt) = &design.optimization {
        if let Some(i) = opt.simulation {
            return Ok(&design.simulations[i]);
        }
    }
    design
        .simulations
        .first()
        .ok_or_else(|| FormaError::InvalidDesign("no simulation config in design".into()))
}

/// Box volumes carry their corners in `url` as `"x0,y0,z0; x1,y1,z1"`.
fn volume_box(volume: &Volume) -> Option<(DVec3, DVec3)> {
    if volume.primitive != "box" {
        return None;
    }
    let url = volume.url.as_deref()?;
    let (a, b) = url.split_once(';')?;
    let min = forma_io::parse::parse_vec(a);
    let max = forma_io::parse::parse_vec(b);
    Some((min.min(max), min.max(max)))
}

fn build_lattice(
    design: &Design,
    config: &SimulationConfig,
    bounds: (DVec3, DVec3),
    sampler: &mut Sampler,
) -> FormaResult<LatticeGraph> {
    let unit = config.lattice.unit.x;
    if unit <= 0.0 {
        return Err(FormaError::InvalidConfig("lattice unit must be positive".into()));
    }
    let (min, max) = bounds;
    let span = max - min;

    let diam = config.lattice.bar_diameter.x.max(1.0e-4);
    let mut bar = BarParams {
        diam,
        ..Default::default()
    };
    if let Some(mi) = config.lattice.material {
        let material = &design.materials[mi];
        // Axial stiffness of a unit-length bar: E·A
        let area = std::f64::consts::PI * (diam / 2.0) * (diam / 2.0);
        if material.elasticity > 0.0 {
            bar.k_unit = material.elasticity * area;
        }
        if material.density > 0.0 {
            bar.mass = material.density * area * unit;
        }
        if material.yield_strength > 0.0 {
            bar.break_force = material.yield_strength * area;
        }
    }

    let mut graph = match config.lattice.fill {
        LatticeFill::Cubic => {
            let cells = [
                (span.x / unit).round().max(1.0) as usize,
                (span.y / unit).round().max(1.0) as usize,
                (span.z / unit).round().max(1.0) as usize,
            ];
            cubic_lattice(min + config.lattice.offset, cells, unit, &bar)
        }
        LatticeFill::Space => space_lattice(min, max, unit * 0.5, unit * 1.2, &bar, sampler),
    };

    if config.lattice.jiggle != DVec3::ZERO {
        jiggle_masses(&mut graph, config.lattice.jiggle, sampler);
    }
    Ok(graph)
}

fn resolve_loads(
    design: &Design,
    config: &SimulationConfig,
    sim: &Simulation,
) -> FormaResult<Vec<forma_sim::ResolvedLoadcase>> {
    let mut queue = Vec::new();
    for &li in &config.load_queue {
        let loadcase = &design.loadcases[li];
        let mut resolved = forma_sim::ResolvedLoadcase {
            total_duration: loadcase.total_duration,
            ..Default::default()
        };
        for anchor in &loadcase.anchors {
            match anchor.volume.map(|i| &design.volumes[i]).and_then(volume_box) {
                Some((min, max)) => resolved
                    .anchors
                    .push(forma_sim::loads::select_masses_in_box(&sim.graph, min, max)),
                None => warn!(volume = %anchor.volume_id, "anchor volume not resolvable"),
            }
        }
        for force in &loadcase.forces {
            match force.volume.map(|i| &design.volumes[i]).and_then(volume_box) {
                Some((min, max)) => resolved.forces.push(forma_sim::ResolvedForce {
                    masses: forma_sim::loads::select_masses_in_box(&sim.graph, min, max),
                    magnitude: force.magnitude,
                    duration: force.duration,
                    vary: force.vary,
                }),
                None => warn!(volume = %force.volume_id, "force volume not resolvable"),
            }
        }
        queue.push(resolved);
    }
    Ok(queue)
}
