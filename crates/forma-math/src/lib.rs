//! # forma-math
//!
//! Small geometric helpers (angles, midpoints, bounds, rotations) and the
//! deterministic sampling source used by every stochastic component.
//!
//! All vector math is `glam::DVec3`; the simulation runs in f64.

pub mod geometry;
pub mod rng;

pub use geometry::{angle_between, bisect, in_bounds, is_acute, rotate_about};
pub use rng::Sampler;
