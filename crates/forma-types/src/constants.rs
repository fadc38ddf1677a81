//! Physical constants and simulation defaults.

/// Gravitational acceleration (m/s²).
pub const GRAVITY: f64 = 9.81;

/// Default integrator substep (seconds).
pub const DEFAULT_DT: f64 = 1.0e-4;

/// A mass counts as externally loaded when `|extforce|` exceeds this.
pub const EXT_FORCE_EPS: f64 = 1.0e-6;

/// Minimum admissible spring rest length. Shifts that would push a rest
/// length below this are rejected.
pub const MIN_REST: f64 = 1.0e-3;

/// Relative energy tolerance for equilibrium detection.
pub const EQUILIBRIUM_EPS: f64 = 1.0e-6;

/// Consecutive near-equal energy windows required to declare equilibrium.
pub const EQUILIBRIUM_WINDOWS: u32 = 10;

/// Windows after which a capped `settle` may bail out on high energy.
pub const SETTLE_CAP_WINDOWS: u32 = 50;

/// Max-stress decay applied to surviving springs after a removal pass.
pub const STRESS_DECAY: f64 = 0.9;

/// Epsilon for collinearity tests when fusing parallel springs.
pub const PARALLEL_EPS: f64 = 1.0e-4;
