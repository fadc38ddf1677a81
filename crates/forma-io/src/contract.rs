//! Design document contract types.
//!
//! These are the typed aggregates the core consumes, arena-owned in the
//! [`Design`] with cross-references held as indices (resolved by the
//! validator), never as copies.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// A complete parsed design document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Design {
    pub version: String,
    pub units: Option<String>,
    pub volumes: Vec<Volume>,
    pub materials: Vec<Material>,
    pub loadcases: Vec<Loadcase>,
    pub simulations: Vec<SimulationConfig>,
    pub optimization: Option<OptimizationConfig>,
}

impl Design {
    pub fn volume_index(&self, id: &str) -> Option<usize> {
        self.volumes.iter().position(|v| v.id == id)
    }

    pub fn material_index(&self, id: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.id == id)
    }

    pub fn loadcase_index(&self, id: &str) -> Option<usize> {
        self.loadcases.iter().position(|l| l.id == id)
    }

    pub fn simulation_index(&self, id: &str) -> Option<usize> {
        self.simulations.iter().position(|s| s.id == id)
    }
}

/// A named geometric region (primitive or mesh URL).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub primitive: String,
    pub url: Option<String>,
    /// RGBA, each component in `[0, 1]`.
    pub color: [f64; 4],
    pub rendering: Option<String>,
    pub units: Option<String>,
}

/// Bar material properties, unit tokens preserved alongside values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Material {
    pub id: String,
    pub name: String,
    pub elasticity: f64,
    pub elasticity_units: Option<String>,
    pub yield_strength: f64,
    pub yield_units: Option<String>,
    pub density: f64,
    pub density_units: Option<String>,
}

/// Anchors plus forces applied together.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Loadcase {
    pub id: String,
    pub anchors: Vec<Anchor>,
    pub forces: Vec<Force>,
    /// The longest force duration; the load queue advances after it.
    pub total_duration: f64,
}

/// Fixes every mass inside a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Anchor {
    pub volume_id: String,
    /// Resolved by the validator; `None` if the id is unknown.
    pub volume: Option<usize>,
}

/// Distributes a force vector over the masses inside a volume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Force {
    pub volume_id: String,
    pub volume: Option<usize>,
    pub magnitude: DVec3,
    /// Seconds; ∞ when the document gave a negative duration.
    pub duration: f64,
    /// Per-component half-range for randomized direction variation.
    pub vary: DVec3,
}

/// Lattice fill style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LatticeFill {
    #[default]
    Cubic,
    Space,
}

/// Lattice generation parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatticeConfig {
    pub fill: LatticeFill,
    pub unit: DVec3,
    pub display: Option<String>,
    pub conform: bool,
    pub offset: DVec3,
    pub bar_diameter: DVec3,
    pub material_id: String,
    pub material: Option<usize>,
    pub jiggle: DVec3,
    pub hull: bool,
}

/// Velocity damping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Damping {
    pub velocity: f64,
}

impl Default for Damping {
    fn default() -> Self {
        Self { velocity: 1.0 }
    }
}

/// Load-repeat policy: reset and re-orient the structure periodically so
/// the optimization averages over load directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepeatConfig {
    /// Seconds between repeats; non-positive disables repeating.
    pub after: f64,
    /// True when the document gave explicit seconds (as opposed to
    /// `"optimize"`).
    pub after_explicit: bool,
    /// Explicit rotation in revolutions per axis; `None` draws a random
    /// rotation each repeat.
    pub rotation: Option<DVec3>,
}

impl Default for RepeatConfig {
    fn default() -> Self {
        Self {
            after: -1.0,
            after_explicit: false,
            rotation: Some(DVec3::ZERO),
        }
    }
}

/// A cutting plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaneConfig {
    pub normal: DVec3,
    pub offset: f64,
}

/// Simulation-level stop criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopCriterion {
    #[default]
    Time,
    Motion,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StopConfig {
    pub criterion: StopCriterion,
    pub threshold: f64,
}

/// One simulation setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub id: String,
    pub volume_id: String,
    pub volume: Option<usize>,
    pub lattice: LatticeConfig,
    pub damping: Damping,
    /// Global acceleration (gravity).
    pub acceleration: DVec3,
    /// Loadcase queue as document ids, in queue order.
    pub load_queue_ids: Vec<String>,
    /// Loadcase queue, resolved to indices by the validator.
    pub load_queue: Vec<usize>,
    pub repeat: RepeatConfig,
    pub plane: Option<PlaneConfig>,
    pub stops: Vec<StopConfig>,
}

/// Optimizer method tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizationMethod {
    RemoveLowStress,
    MassDisplace,
    #[default]
    None,
}

/// One optimization rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationRule {
    pub method: OptimizationMethod,
    pub threshold: f64,
    /// Steps between invocations for frequency-driven rules.
    pub frequency: u64,
}

/// Optimization stop metric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopMetric {
    Weight,
    Energy,
    Deflection,
    #[default]
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationStop {
    pub metric: StopMetric,
    pub threshold: f64,
}

/// Optimization configuration bound to one simulation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationConfig {
    pub simulation_id: String,
    pub simulation: Option<usize>,
    pub rules: Vec<OptimizationRule>,
    pub stop_criteria: Vec<OptimizationStop>,
}
