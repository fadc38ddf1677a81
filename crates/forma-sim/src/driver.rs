//! The simulation driver.
//!
//! One tick: repeat-load check, load-queue advance, one physics window,
//! stop-criteria evaluation, optimization dispatch (equilibrium-gated
//! for the mass displacer, frequency-gated otherwise), load vary, and a
//! metric row. Once a stop criterion holds the driver stops and hands
//! the bar structure to the export worker.

use std::path::PathBuf;

use glam::DVec3;
use tracing::{debug, info};

use forma_export::{timestamp_filename, BarData, ExportHandle, ExportWorker};
use forma_io::{OptimizationRule, OptimizationStop, OptimizationMethod, StopMetric};
use forma_math::geometry::rotate_about;
use forma_math::Sampler;
use forma_optimize::{
    MassDisplacer, MassDisplacerConfig, SpringInserter, SpringRemover,
};
use forma_physics::metrics::{deflection, total_energy, total_length};
use forma_physics::{Scope, Simulation};
use forma_telemetry::{EventBus, MetricEvent};
use forma_types::constants::{EQUILIBRIUM_EPS, EQUILIBRIUM_WINDOWS};
use forma_types::MassId;

use crate::loads::{apply_load, clear_loads, vary_load_direction, ResolvedLoadcase};

/// Driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimStatus {
    Started,
    Paused,
    Stopped,
}

/// Which optimizer the driver currently dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveOptimizer {
    Remover,
    Displacer,
    Inserter,
    None,
}

/// Driver configuration, assembled from the design document.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Physics window per tick (seconds).
    pub render_timestep: f64,
    /// Metric/export output directory.
    pub data_dir: PathBuf,
    /// Seconds between load repeats; non-positive disables repeating.
    pub repeat_after: f64,
    /// True when the design gave explicit repeat seconds. Frequency-gated
    /// rules may then fire before the load queue is exhausted.
    pub repeat_after_explicit: bool,
    /// Explicit repeat rotation (revolutions per axis); `None` = random.
    pub repeat_rotation: Option<DVec3>,
    pub rules: Vec<OptimizationRule>,
    pub stop_criteria: Vec<OptimizationStop>,
    /// Displacer tuning for `mass_displace` rules.
    pub displacer: MassDisplacerConfig,
    /// Stop ratio handed to a `remove_low_stress` rule's remover.
    pub remover_stop_ratio: f64,
    /// RNG seed for the run.
    pub seed: u64,
    /// Facets per exported bar.
    pub export_sides: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            render_timestep: 0.01,
            data_dir: PathBuf::from("data"),
            repeat_after: -1.0,
            repeat_after_explicit: false,
            repeat_rotation: Some(DVec3::ZERO),
            rules: Vec::new(),
            stop_criteria: Vec::new(),
            displacer: MassDisplacerConfig::default(),
            remover_stop_ratio: 0.1,
            seed: 0,
            export_sides: 32,
        }
    }
}

/// Aggregate metrics for status displays.
#[derive(Debug, Clone, Default)]
pub struct SimMetrics {
    pub time: f64,
    pub n_bars: usize,
    pub total_length: f64,
    pub total_energy: f64,
    pub total_length_start: f64,
    pub total_energy_start: f64,
    pub deflection: f64,
    pub optimize_iterations: u64,
    pub displacement: f64,
}

/// Top-level simulation state machine.
pub struct Simulator {
    pub sim: Simulation,
    config: DriverConfig,
    load_queue: Vec<ResolvedLoadcase>,
    bus: EventBus,
    sampler: Sampler,

    pub status: SimStatus,
    active: ActiveOptimizer,
    displacer: Option<MassDisplacer>,
    remover: Option<SpringRemover>,
    inserter: Option<SpringInserter>,
    /// Fallback remover the driver switches to when the energy objective
    /// bottoms out.
    secondary_remover: SpringRemover,

    steps: u64,
    prev_steps: u64,
    optimized: u64,
    switched: bool,

    n_repeats: u32,
    repeat_time: f64,
    optimize_after_repeats: u32,

    current_load: usize,
    past_load_time: f64,
    vary_load: bool,
    load_queue_done: bool,
    deflection_points: Vec<MassId>,

    equilibrium: bool,
    close_to_previous: u32,
    prev_energy: f64,

    total_length: f64,
    total_energy: f64,
    total_length_start: f64,
    total_energy_start: f64,
    center: DVec3,

    /// Running export, if the driver has stopped and submitted one.
    pub export: Option<ExportHandle>,
}

impl Simulator {
    pub fn new(
        sim: Simulation,
        config: DriverConfig,
        load_queue: Vec<ResolvedLoadcase>,
        bus: EventBus,
    ) -> Self {
        let sampler = Sampler::from_seed(config.seed);
        let total_length_start = total_length(&sim, Scope::All);
        let center = sim.graph.center();

        let mut deflection_points = Vec::new();
        for load in &load_queue {
            for m in load.force_masses() {
                if !deflection_points.contains(&m) {
                    deflection_points.push(m);
                }
            }
        }
        let vary_load = load_queue
            .iter()
            .flat_map(|l| l.forces.iter())
            .any(|f| f.vary != DVec3::ZERO);

        let secondary_remover = SpringRemover::new(&sim, 0.05, 0.0);

        let mut driver = Self {
            sim,
            load_queue,
            bus,
            sampler,
            status: SimStatus::Paused,
            active: ActiveOptimizer::None,
            displacer: None,
            remover: None,
            inserter: None,
            secondary_remover,
            steps: 0,
            prev_steps: 0,
            optimized: 0,
            switched: false,
            n_repeats: 0,
            repeat_time: config.repeat_after,
            optimize_after_repeats: if config.repeat_after > 0.0 { 10 } else { 0 },
            current_load: 0,
            past_load_time: 0.0,
            vary_load,
            load_queue_done: false,
            deflection_points,
            equilibrium: false,
            close_to_previous: 0,
            prev_energy: -1.0,
            total_length: total_length_start,
            total_energy: 0.0,
            total_length_start,
            total_energy_start: 0.0,
            center,
            export: None,
            config,
        };
        driver.load_optimizers();
        info!("initialized simulator");
        driver
    }

    fn load_optimizers(&mut self) {
        for rule in &self.config.rules {
            match rule.method {
                OptimizationMethod::RemoveLowStress => {
                    self.remover = Some(SpringRemover::new(
                        &self.sim,
                        rule.threshold,
                        self.config.remover_stop_ratio,
                    ));
                    self.active = ActiveOptimizer::Remover;
                    debug!(threshold = rule.threshold, "created spring remover");
                }
                OptimizationMethod::MassDisplace => {
                    self.displacer = Some(MassDisplacer::new(self.config.displacer.clone()));
                    self.active = ActiveOptimizer::Displacer;
                    debug!(threshold = rule.threshold, "created mass displacer");
                }
                OptimizationMethod::None => {
                    self.active = ActiveOptimizer::None;
                }
            }
        }
    }

    /// Installs a bracing inserter the driver can dispatch to.
    pub fn set_inserter(&mut self, inserter: SpringInserter) {
        self.inserter = Some(inserter);
        self.active = ActiveOptimizer::Inserter;
    }

    pub fn start(&mut self) {
        self.status = SimStatus::Started;
    }

    /// True once every queued loadcase has run out.
    pub fn load_queue_done(&self) -> bool {
        self.load_queue_done
    }

    /// Integrator substeps taken so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn pause(&mut self) {
        if self.status == SimStatus::Started {
            self.status = SimStatus::Paused;
        }
    }

    /// Runs ticks until the driver stops or `max_ticks` elapse.
    pub fn run(&mut self, max_ticks: u64) {
        self.start();
        for _ in 0..max_ticks {
            if self.status != SimStatus::Started {
                break;
            }
            self.tick();
        }
    }

    /// One driver tick.
    pub fn tick(&mut self) {
        if self.status != SimStatus::Started {
            return;
        }

        if self.config.repeat_after > 0.0 && self.repeat_time < self.sim.time() {
            self.repeat_load();
        }

        self.advance_load_queue();

        self.sim.step(self.config.render_timestep);
        self.sim.sync_up();
        self.total_length = total_length(&self.sim, Scope::All);
        self.total_energy = total_energy(&self.sim, Scope::All);

        let stop_reached = self.stop_criteria_met();

        if self.optimized == 0 && self.vary_load {
            self.vary_current_load();
        }

        let energy_driven = self.active == ActiveOptimizer::Displacer && !self.switched;
        if energy_driven {
            self.maybe_switch_to_remover();
        }

        if self.active == ActiveOptimizer::Displacer && !self.switched {
            self.equilibriate();
            if self.equilibrium
                && self.n_repeats >= self.optimize_after_repeats
                && !stop_reached
            {
                self.dispatch_optimizer();
                self.equilibrium = false;
                self.close_to_previous = 0;
                if self.vary_load {
                    self.vary_current_load();
                }
                self.prev_steps = 0;
            }
            self.prev_energy = self.total_energy;
        } else if self.switched {
            self.dispatch_optimizer();
            self.prev_steps = 0;
            self.current_load = 0;
        } else {
            // Frequency rules hold until the load queue has run out,
            // unless repeats are explicitly scheduled
            let loads_settled = self.load_queue_done || self.config.repeat_after_explicit;
            let frequencies: Vec<u64> = self.config.rules.iter().map(|r| r.frequency).collect();
            for frequency in frequencies {
                if loads_settled
                    && self.prev_steps >= frequency
                    && self.n_repeats >= self.optimize_after_repeats
                    && !stop_reached
                    && self.active != ActiveOptimizer::None
                {
                    self.dispatch_optimizer();
                    self.prev_steps = 0;
                }
            }
        }

        let window_steps = (self.config.render_timestep / self.sim.dt()).round() as u64;
        self.steps += window_steps;
        self.prev_steps += window_steps;

        self.write_metric();
        self.bus.flush();

        if stop_reached {
            self.status = SimStatus::Stopped;
            info!(time = self.sim.time(), "stop criterion met");
            self.export_simulation();
            self.bus.finalize();
        }
    }

    fn advance_load_queue(&mut self) {
        if self.load_queue.is_empty() || self.sim.time() < self.past_load_time {
            return;
        }
        if self.current_load >= self.load_queue.len() {
            self.load_queue_done = true;
            return;
        }
        debug!(load = self.current_load, "advancing load queue");
        clear_loads(&mut self.sim);
        let load = self.load_queue[self.current_load].clone();
        apply_load(&mut self.sim, &load);
        self.past_load_time += load.total_duration;
        self.current_load += 1;
    }

    fn vary_current_load(&mut self) {
        let index = if self.current_load > 0 {
            self.current_load - 1
        } else if !self.load_queue.is_empty() {
            self.load_queue.len() - 1
        } else {
            return;
        };
        let load = self.load_queue[index].clone();
        vary_load_direction(&mut self.sim, &load, &mut self.sampler);
    }

    /// Resets every mass to its original position rotated about the
    /// structure's center, zeroing motion, so optimization averages over
    /// load orientations.
    fn repeat_load(&mut self) {
        let turns = match self.config.repeat_rotation {
            Some(r) => r,
            None => self.sampler.direction(),
        };

        for (_, m) in self.sim.graph.masses_mut() {
            m.pos = rotate_about(m.origpos, self.center, turns);
            m.vel = DVec3::ZERO;
            m.acc = DVec3::ZERO;
        }
        self.repeat_time += self.config.repeat_after;
        self.n_repeats += 1;
        self.sim.sync_down();
        debug!(repeats = self.n_repeats, "repeated load");
    }

    /// Energy equilibrium detector: ten consecutive windows of relative
    /// energy change under 1e-6. The first equilibrium pins the energy
    /// baseline the stop ratio is measured against.
    fn equilibriate(&mut self) {
        if self.prev_energy > 0.0
            && (self.prev_energy - self.total_energy).abs() < self.total_energy * EQUILIBRIUM_EPS
        {
            self.close_to_previous += 1;
        } else {
            self.close_to_previous = 0;
        }
        if self.close_to_previous > EQUILIBRIUM_WINDOWS {
            self.equilibrium = true;
            if self.optimized == 0 {
                self.total_energy_start = self.total_energy;
            }
        }
    }

    /// Switches the active optimizer to the fallback remover once the
    /// energy objective has bottomed out.
    fn maybe_switch_to_remover(&mut self) {
        if self.total_energy_start <= 0.0 {
            return;
        }
        if self.total_energy / self.total_energy_start < 0.1 {
            self.switched = true;
            self.active = ActiveOptimizer::Remover;
            info!("switched to spring remover");
        }
    }

    fn dispatch_optimizer(&mut self) {
        match self.active {
            ActiveOptimizer::Displacer => {
                if let Some(d) = self.displacer.as_mut() {
                    d.optimize(&mut self.sim, &mut self.sampler);
                }
            }
            ActiveOptimizer::Remover => {
                if self.switched || self.remover.is_none() {
                    self.secondary_remover.optimize(&mut self.sim);
                } else if let Some(r) = self.remover.as_mut() {
                    r.optimize(&mut self.sim);
                }
            }
            ActiveOptimizer::Inserter => {
                if let Some(i) = self.inserter.as_mut() {
                    i.optimize(&mut self.sim);
                }
            }
            ActiveOptimizer::None => return,
        }
        self.optimized += 1;
    }

    fn stop_criteria_met(&mut self) -> bool {
        let criteria = self.config.stop_criteria.clone();
        let mut stop = false;
        for s in &criteria {
            stop = match s.metric {
                StopMetric::Energy => {
                    let triggered = self.total_energy_start > 0.0
                        && self.total_energy / self.total_energy_start <= s.threshold;
                    if triggered && !self.switched && self.active == ActiveOptimizer::Displacer {
                        // A secondary optimizer is configured; switch
                        // instead of stopping.
                        self.switched = true;
                        self.active = ActiveOptimizer::Remover;
                        info!("energy stop reached, switching optimizer");
                        false
                    } else {
                        triggered
                    }
                }
                StopMetric::Weight => {
                    self.total_length / self.total_length_start <= s.threshold
                }
                StopMetric::Deflection => self.current_deflection() >= s.threshold,
                StopMetric::None => false,
            };
        }
        stop
    }

    fn current_deflection(&self) -> f64 {
        deflection(&self.sim, &self.deflection_points)
    }

    fn write_metric(&mut self) {
        let energy_mode = self
            .config
            .stop_criteria
            .first()
            .map(|s| s.metric == StopMetric::Energy)
            .unwrap_or(false);

        if energy_mode {
            let (displacement, attempts) = self
                .displacer
                .as_ref()
                .map(|d| (d.dx, d.attempts))
                .unwrap_or((0.0, 0));
            self.bus.emit(MetricEvent::EnergyRow {
                time: self.sim.time(),
                iteration: self.optimized,
                deflection: self.current_deflection(),
                displacement,
                attempts,
                total_energy: self.total_energy,
                total_weight: self.total_length,
            });
        } else {
            self.bus.emit(MetricEvent::WeightRow {
                time: self.sim.time(),
                iteration: self.optimized,
                deflection: self.current_deflection(),
                total_weight: self.total_length,
                bar_count: self.sim.graph.n_springs(),
            });
        }

        // Drain tracked-mass samples from instrumented relaxations
        if let Some(d) = self.displacer.as_mut() {
            for s in d.track_samples.drain(..) {
                self.bus.emit(MetricEvent::TrackedMass {
                    step: s.step,
                    position: [s.pos.x, s.pos.y, s.pos.z],
                    force: [s.force.x, s.force.y, s.force.z],
                    index: s.index,
                });
            }
        }
    }

    /// Snapshots the bars and submits them to the export worker with a
    /// local-timestamp filename.
    pub fn export_simulation(&mut self) {
        let data = BarData::from_simulation(&self.sim);
        let diam = self
            .sim
            .graph
            .springs()
            .next()
            .map(|(_, s)| s.diam)
            .unwrap_or(0.002)
            .max(1.0e-4);
        let path = self.config.data_dir.join(timestamp_filename());
        info!(bars = data.bars.len(), path = %path.display(), "starting export");
        // Single segment per bar
        self.export = Some(ExportWorker::start(
            data,
            path,
            0.0,
            diam,
            self.config.export_sides,
        ));
    }

    /// Aggregate metrics for status displays.
    pub fn metrics(&self) -> SimMetrics {
        SimMetrics {
            time: self.sim.time(),
            n_bars: self.sim.graph.n_springs(),
            total_length: self.total_length,
            total_energy: self.total_energy,
            total_length_start: self.total_length_start,
            total_energy_start: self.total_energy_start,
            deflection: self.current_deflection(),
            optimize_iterations: self.optimized,
            displacement: self.displacer.as_ref().map(|d| d.dx).unwrap_or(0.0),
        }
    }

    /// Human-readable status line.
    pub fn print_status(&self) {
        let m = self.metrics();
        info!(
            time = m.time,
            iterations = m.optimize_iterations,
            bars = m.n_bars,
            weight = m.total_length,
            "simulating"
        );
    }
}
