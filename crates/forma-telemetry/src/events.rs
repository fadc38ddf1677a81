//! Metric event types.
//!
//! Rows are value types keyed by simulation time; the sinks decide the
//! on-disk layout. Two optimization streams exist — the energy-driven
//! stream written while the mass displacer runs, and the weight-driven
//! stream written while the spring remover runs — plus the tracked-mass
//! force stream from instrumented relaxations.

use serde::{Deserialize, Serialize};

/// A metric row emitted by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MetricEvent {
    /// Energy-driven optimization progress
    /// (`Time,Iteration,Deflection,Displacement,Attempts,Total Energy,Total Weight`).
    EnergyRow {
        time: f64,
        iteration: u64,
        deflection: f64,
        displacement: f64,
        attempts: u32,
        total_energy: f64,
        total_weight: f64,
    },

    /// Weight-driven optimization progress
    /// (`Time,Iteration,Deflection,Total Weight,Bar Number`).
    WeightRow {
        time: f64,
        iteration: u64,
        deflection: f64,
        total_weight: f64,
        bar_count: usize,
    },

    /// One tracked mass sampled during an instrumented relaxation
    /// (`Time,Position(x,y,z),Force(x,y,z),Index`).
    TrackedMass {
        step: u32,
        position: [f64; 3],
        force: [f64; 3],
        index: usize,
    },
}
