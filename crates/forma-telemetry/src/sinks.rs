//! Pluggable metric sinks.
//!
//! The CSV sink splits the event stream across the two data files
//! (`optMetrics.csv` for optimization rows, `outsideForces.csv` for
//! tracked-mass rows) and writes each header lazily on the first row of
//! its stream. Write failures disable the sink rather than aborting the
//! simulation.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::events::MetricEvent;

/// Trait for metric consumers.
pub trait MetricSink: Send {
    /// Process a single event.
    fn handle(&mut self, event: &MetricEvent);

    /// Called once at simulation stop. Flush buffers, close files.
    fn finalize(&mut self) {}

    /// Human-readable name for this sink.
    fn name(&self) -> &str;
}

/// Collects events into a `Vec` for tests and inspection.
#[derive(Default)]
pub struct VecSink {
    pub events: Vec<MetricEvent>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricSink for VecSink {
    fn handle(&mut self, event: &MetricEvent) {
        self.events.push(event.clone());
    }

    fn name(&self) -> &str {
        "vec_sink"
    }
}

/// Logs every event through `tracing`.
pub struct TracingSink;

impl MetricSink for TracingSink {
    fn handle(&mut self, event: &MetricEvent) {
        tracing::info!(event = ?event, "metric");
    }

    fn name(&self) -> &str {
        "tracing_sink"
    }
}

const OPT_METRICS_FILE: &str = "optMetrics.csv";
const OUTSIDE_FORCES_FILE: &str = "outsideForces.csv";

const ENERGY_HEADER: &str = "Time,Iteration,Deflection,Displacement,Attempts,Total Energy,Total Weight\n";
const WEIGHT_HEADER: &str = "Time,Iteration,Deflection,Total Weight,Bar Number\n";
const TRACKED_HEADER: &str = "Time,Position(x),Position(y),Position(z),Force(x),Force(y),Force(z),Index\n";

/// Appends metric rows to the CSV files under a data directory.
pub struct CsvSink {
    opt_path: PathBuf,
    tracked_path: PathBuf,
    opt_file: Option<File>,
    tracked_file: Option<File>,
    failed: bool,
}

impl CsvSink {
    /// Creates a sink writing under `data_dir`. The directory is created
    /// (or emptied of the two metric files) up front.
    pub fn new(data_dir: &Path) -> std::io::Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let opt_path = data_dir.join(OPT_METRICS_FILE);
        let tracked_path = data_dir.join(OUTSIDE_FORCES_FILE);
        for p in [&opt_path, &tracked_path] {
            if p.exists() {
                std::fs::remove_file(p)?;
            }
        }
        Ok(Self {
            opt_path,
            tracked_path,
            opt_file: None,
            tracked_file: None,
            failed: false,
        })
    }

    fn write(&mut self, tracked: bool, header: &str, line: &str) {
        if self.failed {
            return;
        }
        let (slot, path) = if tracked {
            (&mut self.tracked_file, &self.tracked_path)
        } else {
            (&mut self.opt_file, &self.opt_path)
        };

        if slot.is_none() {
            match OpenOptions::new().create(true).append(true).open(path) {
                Ok(mut f) => {
                    if f.write_all(header.as_bytes()).is_err() {
                        self.failed = true;
                        return;
                    }
                    *slot = Some(f);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "metric file open failed");
                    self.failed = true;
                    return;
                }
            }
        }
        if let Some(f) = slot {
            if f.write_all(line.as_bytes()).is_err() {
                self.failed = true;
            }
        }
    }
}

impl MetricSink for CsvSink {
    fn handle(&mut self, event: &MetricEvent) {
        match event {
            MetricEvent::EnergyRow {
                time,
                iteration,
                deflection,
                displacement,
                attempts,
                total_energy,
                total_weight,
            } => {
                let line = format!(
                    "{},{},{},{},{},{},{}\n",
                    time, iteration, deflection, displacement, attempts, total_energy, total_weight
                );
                self.write(false, ENERGY_HEADER, &line);
            }
            MetricEvent::WeightRow {
                time,
                iteration,
                deflection,
                total_weight,
                bar_count,
            } => {
                let line = format!(
                    "{},{},{},{},{}\n",
                    time, iteration, deflection, total_weight, bar_count
                );
                self.write(false, WEIGHT_HEADER, &line);
            }
            MetricEvent::TrackedMass {
                step,
                position,
                force,
                index,
            } => {
                let line = format!(
                    "{},{},{},{},{},{},{},{}\n",
                    step,
                    position[0],
                    position[1],
                    position[2],
                    force[0],
                    force[1],
                    force[2],
                    index
                );
                self.write(true, TRACKED_HEADER, &line);
            }
        }
    }

    fn finalize(&mut self) {
        if let Some(f) = &mut self.opt_file {
            let _ = f.flush();
        }
        if let Some(f) = &mut self.tracked_file {
            let _ = f.flush();
        }
    }

    fn name(&self) -> &str {
        "csv_sink"
    }
}
