//! # forma-graph
//!
//! The mass–spring graph model: arena-owned masses and springs with
//! stable ids, logical containers, the mass→spring incidence map, and
//! lattice generators used to seed simulations.
//!
//! The graph is pure data — integration lives in `forma-physics`,
//! topology optimization in `forma-optimize`.

pub mod generators;
pub mod incidence;
pub mod model;

pub use incidence::Incidence;
pub use model::{BarParams, Container, LatticeGraph, Mass, Spring};
