//! Background export worker.
//!
//! Receives an immutable bar snapshot at submission and owns its
//! polygonizer. Cancellation is cooperative: the abort flag is checked
//! between the three phases, and an in-flight phase always runs to
//! completion. I/O failure aborts the export silently; the simulation
//! state is unaffected.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::Local;
use tracing::{info, warn};

use crate::bar::BarData;
use crate::polygonizer::Polygonizer;

/// Local-timestamp STL filename, e.g. `28-02-2026_14-03-59.stl`.
pub fn timestamp_filename() -> String {
    format!("{}.stl", Local::now().format("%d-%m-%Y_%H-%M-%S"))
}

/// Spawns export workers.
pub struct ExportWorker;

impl ExportWorker {
    /// Starts an export of `data` to `path` on a background thread.
    pub fn start(
        data: BarData,
        path: PathBuf,
        resolution: f64,
        diameter: f64,
        sides: usize,
    ) -> ExportHandle {
        let abort = Arc::new(AtomicBool::new(false));
        let abort_flag = Arc::clone(&abort);

        let thread = std::thread::spawn(move || {
            let mut polygonizer = Polygonizer::new(data, resolution, diameter, sides);

            polygonizer.init_base_segments();
            if abort_flag.load(Ordering::Relaxed) {
                return false;
            }
            polygonizer.calculate_polygon();
            if abort_flag.load(Ordering::Relaxed) {
                return false;
            }
            match polygonizer.write_stl(&path) {
                Ok(()) => {
                    info!(path = %path.display(), "exported geometry");
                    true
                }
                Err(e) => {
                    warn!(error = %e, "export aborted");
                    false
                }
            }
        });

        ExportHandle { thread, abort }
    }
}

/// Handle to a running export.
pub struct ExportHandle {
    thread: JoinHandle<bool>,
    abort: Arc<AtomicBool>,
}

impl ExportHandle {
    /// Requests a cooperative abort; the current phase finishes first.
    pub fn abort(&self) {
        self.abort.store(true, Ordering::Relaxed);
    }

    /// Waits for the worker. Returns true if a file was written.
    pub fn join(self) -> bool {
        self.thread.join().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bar::Bar;
    use glam::DVec3;

    #[test]
    fn export_writes_a_file() {
        let dir = std::env::temp_dir().join("forma_export_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(timestamp_filename());

        let data = BarData {
            bars: vec![Bar {
                start: DVec3::ZERO,
                end: DVec3::X,
                diam: 0.01,
            }],
        };
        let handle = ExportWorker::start(data, path.clone(), 0.0, 0.01, 8);
        assert!(handle.join());
        assert!(path.exists());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn aborted_export_writes_nothing() {
        let dir = std::env::temp_dir().join("forma_export_abort");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("aborted.stl");

        let data = BarData { bars: Vec::new() };
        let handle = ExportWorker::start(data, path.clone(), 0.0, 0.01, 8);
        handle.abort();
        handle.join();
        // Empty bar data never produces geometry either way
        assert!(!path.exists());
    }
}
