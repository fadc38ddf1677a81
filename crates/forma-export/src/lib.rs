//! # forma-export
//!
//! Turns the surviving bar structure into a watertight-enough triangle
//! mesh and writes it as binary STL. The export runs on a background
//! worker with a cooperative abort flag checked between its three
//! phases; the simulation never blocks on it.

pub mod bar;
pub mod polygonizer;
pub mod stl;
pub mod worker;

pub use bar::{Bar, BarData};
pub use polygonizer::Polygonizer;
pub use worker::{timestamp_filename, ExportHandle, ExportWorker};
