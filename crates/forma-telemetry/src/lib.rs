//! # forma-telemetry
//!
//! Metric events for the optimization run. The driver emits structured
//! rows (optimization progress, tracked-mass forces) onto an event bus;
//! pluggable sinks consume them (CSV files, the `tracing` log, an
//! in-memory vec for tests).

pub mod bus;
pub mod events;
pub mod sinks;

pub use bus::EventBus;
pub use events::MetricEvent;
pub use sinks::{CsvSink, MetricSink, TracingSink, VecSink};
