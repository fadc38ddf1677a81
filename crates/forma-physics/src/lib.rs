//! # forma-physics
//!
//! The explicit mass–spring integrator behind the Physics Adapter
//! contract: `step(dt)`, `sync_down()` (host→device), `sync_up()`
//! (device→host), and create/delete of masses, springs, and containers.
//!
//! The "device" is an in-process SoA buffer set laid out per arena slot;
//! a GPU backend would replace [`buffers::DeviceBuffers`] without
//! changing the adapter surface.
//!
//! `metrics` holds the scoped length/energy aggregates and the two
//! bounded relaxation drivers (`settle`, `relax`).

pub mod buffers;
pub mod metrics;
pub mod simulation;

pub use metrics::{Scope, TrackSample};
pub use simulation::{PhysicsParams, Simulation};
