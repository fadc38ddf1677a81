//! # forma-sim
//!
//! The top-level simulation driver: a `{Started, Paused, Stopped}` state
//! machine that interleaves physics windows with optimization passes,
//! advances the load queue, detects energy equilibrium, evaluates stop
//! criteria, streams metric rows, and hands the final structure to the
//! export worker.

pub mod driver;
pub mod loads;
pub mod snapshot;

pub use driver::{DriverConfig, SimMetrics, SimStatus, Simulator};
pub use loads::{ResolvedForce, ResolvedLoadcase};
pub use snapshot::StateSnapshot;
