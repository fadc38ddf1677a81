//! Scalar type alias for the simulation.
//!
//! Energy equilibrium is detected at 1e-6 relative tolerance over many
//! thousands of substeps, which is out of reach for f32 accumulation.

/// The floating-point type used throughout the simulation.
pub type Scalar = f64;
