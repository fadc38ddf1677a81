//! JSON design reader.
//!
//! The on-disk document nests everything under a `dml` root with a
//! `version` attribute; values arrive as strings in the document's
//! attribute syntax and are converted through the tolerant parsers.
//! Anything malformed below the root warns and defaults; only a
//! missing/foreign root or version is an error.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use forma_types::{FormaError, FormaResult};

use crate::contract::*;
use crate::parse::{normalize_duration, parse_quantity, parse_threshold, parse_vec};
use crate::validator::resolve_references;

#[derive(Debug, Deserialize)]
struct RawDocument {
    dml: RawDml,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawDml {
    version: String,
    units: Option<String>,
    volumes: Vec<RawVolume>,
    materials: Vec<RawMaterial>,
    loadcases: Vec<RawLoadcase>,
    simulations: Vec<RawSimulation>,
    optimization: Option<RawOptimization>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawVolume {
    id: String,
    primitive: String,
    url: Option<String>,
    color: Option<String>,
    alpha: Option<f64>,
    rendering: Option<String>,
    units: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawMaterial {
    id: String,
    name: String,
    elasticity: Option<String>,
    #[serde(rename = "yield")]
    yield_strength: Option<String>,
    density: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawLoadcase {
    id: String,
    anchors: Vec<RawAnchor>,
    forces: Vec<RawForce>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawAnchor {
    volume: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawForce {
    volume: String,
    magnitude: Option<String>,
    duration: Option<f64>,
    vary: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawSimulation {
    id: String,
    volume: String,
    lattice: Option<RawLattice>,
    damping: Option<RawDamping>,
    global: Option<RawGlobal>,
    load: Option<serde_json::Value>,
    repeat: Option<RawRepeat>,
    plane: Option<RawPlane>,
    stops: Vec<RawStop>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawLattice {
    fill: Option<String>,
    unit: Option<String>,
    display: Option<String>,
    conform: Option<bool>,
    offset: Option<String>,
    bardiam: Option<String>,
    material: Option<String>,
    jiggle: Option<String>,
    hull: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawDamping {
    velocity: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawGlobal {
    acceleration: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawRepeat {
    after: Option<String>,
    rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawPlane {
    normal: Option<String>,
    offset: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawStop {
    criterion: Option<String>,
    metric: Option<String>,
    threshold: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawOptimization {
    simulation: String,
    rules: Vec<RawRule>,
    stops: Vec<RawStop>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct RawRule {
    method: Option<String>,
    threshold: Option<String>,
    frequency: Option<u64>,
}

/// Reads and resolves a design document from disk.
pub fn read_design(path: &Path) -> FormaResult<Design> {
    let text = std::fs::read_to_string(path)?;
    read_design_str(&text)
}

/// Reads and resolves a design document from a JSON string.
pub fn read_design_str(text: &str) -> FormaResult<Design> {
    let raw: RawDocument = serde_json::from_str(text)
        .map_err(|e| FormaError::InvalidDesign(format!("not a dml document: {e}")))?;

    if raw.dml.version != "1.0" {
        return Err(FormaError::InvalidDesign(format!(
            "unsupported dml version '{}'",
            raw.dml.version
        )));
    }

    let mut design = convert(raw.dml);
    resolve_references(&mut design);
    info!(
        volumes = design.volumes.len(),
        materials = design.materials.len(),
        loadcases = design.loadcases.len(),
        simulations = design.simulations.len(),
        "design loaded"
    );
    Ok(design)
}

fn convert(raw: RawDml) -> Design {
    Design {
        version: raw.version,
        units: raw.units,
        volumes: raw.volumes.into_iter().map(convert_volume).collect(),
        materials: raw.materials.into_iter().map(convert_material).collect(),
        loadcases: raw.loadcases.into_iter().map(convert_loadcase).collect(),
        simulations: raw.simulations.into_iter().map(convert_simulation).collect(),
        optimization: raw.optimization.map(convert_optimization),
    }
}

fn convert_volume(raw: RawVolume) -> Volume {
    let mut color = [0.0, 0.0, 0.0, raw.alpha.unwrap_or(1.0)];
    if let Some(text) = &raw.color {
        let parts: Vec<f64> = text
            .replace(',', " ")
            .split_whitespace()
            .filter_map(|t| t.parse().ok())
            .collect();
        match parts.len() {
            3 => color[..3].copy_from_slice(&parts),
            4 => color.copy_from_slice(&parts),
            _ => warn!(input = %text, volume = %raw.id, "malformed color"),
        }
    }
    Volume {
        id: raw.id,
        primitive: raw.primitive,
        url: raw.url,
        color,
        rendering: raw.rendering,
        units: raw.units,
    }
}

fn convert_material(raw: RawMaterial) -> Material {
    let (elasticity, elasticity_units) =
        raw.elasticity.as_deref().map(parse_quantity).unwrap_or((0.0, None));
    let (yield_strength, yield_units) = raw
        .yield_strength
        .as_deref()
        .map(parse_quantity)
        .unwrap_or((0.0, None));
    let (density, density_units) =
        raw.density.as_deref().map(parse_quantity).unwrap_or((0.0, None));
    Material {
        id: raw.id,
        name: raw.name,
        elasticity,
        elasticity_units,
        yield_strength,
        yield_units,
        density,
        density_units,
    }
}

fn convert_loadcase(raw: RawLoadcase) -> Loadcase {
    let forces: Vec<Force> = raw
        .forces
        .into_iter()
        .map(|f| Force {
            volume_id: f.volume,
            volume: None,
            magnitude: f.magnitude.as_deref().map(parse_vec).unwrap_or_default(),
            duration: normalize_duration(f.duration.unwrap_or(-1.0)),
            vary: f.vary.as_deref().map(parse_vec).unwrap_or_default(),
        })
        .collect();
    let total_duration = forces
        .iter()
        .map(|f| f.duration)
        .fold(0.0f64, f64::max);
    Loadcase {
        id: raw.id,
        anchors: raw
            .anchors
            .into_iter()
            .map(|a| Anchor {
                volume_id: a.volume,
                volume: None,
            })
            .collect(),
        forces,
        total_duration,
    }
}

fn convert_simulation(raw: RawSimulation) -> SimulationConfig {
    let lattice = raw.lattice.unwrap_or_default();
    let repeat = raw.repeat.unwrap_or_default();

    // The load can be one id or a queue of ids; resolution to indices
    // happens in the validator, ids are kept in the queue order here.
    let load_ids: Vec<String> = match &raw.load {
        Some(serde_json::Value::String(id)) => vec![id.clone()],
        Some(serde_json::Value::Array(ids)) => ids
            .iter()
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect(),
        Some(other) => {
            warn!(sim = %raw.id, value = %other, "malformed load reference");
            Vec::new()
        }
        None => Vec::new(),
    };

    SimulationConfig {
        id: raw.id,
        volume_id: raw.volume,
        volume: None,
        lattice: LatticeConfig {
            fill: match lattice.fill.as_deref() {
                Some("space") | Some("space_fill") => LatticeFill::Space,
                _ => LatticeFill::Cubic,
            },
            unit: lattice.unit.as_deref().map(parse_vec).unwrap_or_default(),
            display: lattice.display,
            conform: lattice.conform.unwrap_or(false),
            offset: lattice.offset.as_deref().map(parse_vec).unwrap_or_default(),
            bar_diameter: lattice.bardiam.as_deref().map(parse_vec).unwrap_or_default(),
            material_id: lattice.material.unwrap_or_default(),
            material: None,
            jiggle: lattice.jiggle.as_deref().map(parse_vec).unwrap_or_default(),
            hull: lattice.hull.unwrap_or(false),
        },
        damping: Damping {
            velocity: raw.damping.and_then(|d| d.velocity).unwrap_or(1.0),
        },
        acceleration: raw
            .global
            .and_then(|g| g.acceleration.as_deref().map(parse_vec))
            .unwrap_or_default(),
        load_queue_ids: load_ids,
        load_queue: Vec::new(),
        repeat: RepeatConfig {
            after: match repeat.after.as_deref() {
                Some("optimize") => -1.0,
                Some(text) => parse_threshold(text, -1.0),
                None => -1.0,
            },
            after_explicit: matches!(repeat.after.as_deref(), Some(t) if t != "optimize"),
            rotation: match repeat.rotation.as_deref() {
                Some("random") => None,
                Some(text) => Some(parse_vec(text)),
                None => Some(glam::DVec3::ZERO),
            },
        },
        plane: raw.plane.map(|p| PlaneConfig {
            normal: p
                .normal
                .as_deref()
                .map(parse_vec)
                .unwrap_or(glam::DVec3::Y),
            offset: p.offset.unwrap_or(0.0),
        }),
        stops: raw
            .stops
            .into_iter()
            .map(|s| StopConfig {
                criterion: match s.criterion.as_deref() {
                    Some("motion") => StopCriterion::Motion,
                    _ => StopCriterion::Time,
                },
                threshold: s
                    .threshold
                    .as_deref()
                    .map(|t| parse_threshold(t, 0.0))
                    .unwrap_or(0.0),
            })
            .collect(),
    }
}

fn convert_optimization(raw: RawOptimization) -> OptimizationConfig {
    OptimizationConfig {
        simulation_id: raw.simulation,
        simulation: None,
        rules: raw
            .rules
            .into_iter()
            .map(|r| OptimizationRule {
                method: match r.method.as_deref() {
                    Some("remove_low_stress") => OptimizationMethod::RemoveLowStress,
                    Some("mass_displace") => OptimizationMethod::MassDisplace,
                    _ => OptimizationMethod::None,
                },
                threshold: r
                    .threshold
                    .as_deref()
                    .map(|t| parse_threshold(t, 0.0))
                    .unwrap_or(0.0),
                frequency: r.frequency.unwrap_or(0),
            })
            .collect(),
        stop_criteria: raw
            .stops
            .into_iter()
            .map(|s| OptimizationStop {
                metric: match s.metric.as_deref() {
                    Some("weight") => StopMetric::Weight,
                    Some("energy") => StopMetric::Energy,
                    Some("deflection") => StopMetric::Deflection,
                    _ => StopMetric::None,
                },
                threshold: s
                    .threshold
                    .as_deref()
                    .map(|t| parse_threshold(t, 1.0))
                    .unwrap_or(1.0),
            })
            .collect(),
    }
}
