//! Binary state snapshots.
//!
//! A snapshot captures the whole graph (arenas, containers, topology)
//! plus the clock, for resume and replay. Serialized with `bincode`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use forma_graph::LatticeGraph;
use forma_physics::Simulation;
use forma_types::{FormaError, FormaResult};

/// A complete simulation state snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub sim_time: f64,
    pub graph: LatticeGraph,
}

impl StateSnapshot {
    /// Captures the current host-side state. Call after `sync_up`.
    pub fn capture(sim: &Simulation) -> Self {
        Self {
            sim_time: sim.time(),
            graph: sim.graph.clone(),
        }
    }

    /// Serializes to compact binary format.
    pub fn to_bytes(&self) -> FormaResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| FormaError::Serialization(e.to_string()))
    }

    /// Deserializes from binary format.
    pub fn from_bytes(data: &[u8]) -> FormaResult<Self> {
        bincode::deserialize(data).map_err(|e| FormaError::Serialization(e.to_string()))
    }

    /// Writes the snapshot to disk.
    pub fn write(&self, path: &Path) -> FormaResult<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Loads a snapshot from disk.
    pub fn load(path: &Path) -> FormaResult<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }
}
