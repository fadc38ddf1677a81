//! # forma-io
//!
//! The design-document boundary of the engine: typed contract structs
//! for volumes, materials, loadcases, simulation configs, and
//! optimization configs; tolerant value parsing (vector strings, percent
//! thresholds, unit-suffixed quantities); a JSON reader enforcing the
//! `dml` 1.0 root; and the cross-reference validator.
//!
//! Parsing is forgiving by policy: malformed values warn and default,
//! unknown ids warn and stay unresolved. Only a missing or foreign root
//! is an error.

pub mod contract;
pub mod parse;
pub mod reader;
pub mod validator;

pub use contract::{
    Anchor, Damping, Design, Force, LatticeConfig, LatticeFill, Loadcase, Material,
    OptimizationConfig, OptimizationMethod, OptimizationRule, OptimizationStop, PlaneConfig,
    RepeatConfig, SimulationConfig, StopConfig, StopCriterion, StopMetric, Volume,
};
pub use reader::{read_design, read_design_str};
