//! Stochastic mass displacement.
//!
//! The displacer relocates one joint at a time by a random `dx` and
//! keeps the move iff the strain-energy × length objective improves in
//! the scope used to test it. The expensive part is the relaxation
//! between shift and measurement; the tile and population modes amortize
//! one relaxation across many simultaneous independent trials.

pub mod groups;
pub mod population;

use glam::DVec3;
use tracing::{debug, info};

use forma_math::Sampler;
use forma_physics::metrics::{assert_finite_energy, relax, settle, total_energy, total_length};
use forma_physics::{Scope, Simulation, TrackSample};
use forma_types::constants::{EQUILIBRIUM_EPS, MIN_REST};
use forma_types::{ContainerId, MassId, SpringId};

use crate::Optimizer;

pub use groups::MassGroup;

/// Which trial scheme the displacer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplacementMode {
    /// One probe per relaxation, tested against the whole structure.
    Single,
    /// The structure is cut into tiles; one probe per tile, each tested
    /// locally.
    Tiled,
    /// One probe per replica container; all replicas share one
    /// relaxation.
    Population,
    /// Tiles × replicas: one accepted probe per tile row.
    SplitPopulation,
}

/// How tiles are formed in the tiled modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileStrategy {
    /// Axis-aligned cubes of side `unit`, shiftable by a grid offset.
    Grid,
    /// Poisson-disc cluster centers; masses join the nearest center.
    Cluster,
}

/// Displacer tuning.
#[derive(Debug, Clone)]
pub struct MassDisplacerConfig {
    /// Magnitude of each trial shift.
    pub displacement: f64,
    pub mode: DisplacementMode,
    pub tile_strategy: TileStrategy,
    /// Tile side (grid) or minimum cluster separation (cluster).
    pub unit: f64,
    /// When positive, single-mass mode moves every mass within this
    /// radius rigidly with the picked one.
    pub chunk_cutoff: f64,
    /// Relaxation substeps between shift and measurement; 0 settles to
    /// energy equilibrium instead.
    pub relaxation: u32,
    /// Replica count for the population modes.
    pub pop_size: usize,
}

impl Default for MassDisplacerConfig {
    fn default() -> Self {
        Self {
            displacement: 0.02,
            mode: DisplacementMode::Population,
            tile_strategy: TileStrategy::Grid,
            unit: 0.1,
            chunk_cutoff: 0.0,
            relaxation: 4000,
            pop_size: 40,
        }
    }
}

/// Energy-driven mass relocation optimizer.
pub struct MassDisplacer {
    pub config: MassDisplacerConfig,
    /// Current shift magnitude (surfaced in the metric rows).
    pub dx: f64,
    /// Trials in the most recent `optimize` call.
    pub attempts: u32,
    pub total_attempts: u64,
    /// Accepted relocations across the run.
    pub iterations: u64,
    /// Masses sampled during instrumented relaxations.
    pub tracked: Vec<MassId>,
    /// Samples accumulated by instrumented relaxations; the driver
    /// drains these into the telemetry stream.
    pub track_samples: Vec<TrackSample>,
    /// Grid offset applied to the next tiling.
    pub grid_offset: DVec3,
    population: Vec<ContainerId>,
}

impl MassDisplacer {
    pub fn new(config: MassDisplacerConfig) -> Self {
        let dx = config.displacement;
        Self {
            config,
            dx,
            attempts: 0,
            total_attempts: 0,
            iterations: 0,
            tracked: Vec::new(),
            track_samples: Vec::new(),
            grid_offset: DVec3::ZERO,
            population: Vec::new(),
        }
    }

    /// Runs trials until at least one relocation is accepted.
    pub fn optimize(&mut self, sim: &mut Simulation, sampler: &mut Sampler) {
        self.attempts = 0;

        if matches!(
            self.config.mode,
            DisplacementMode::Population | DisplacementMode::SplitPopulation
        ) && self.population.is_empty()
        {
            self.population =
                population::create_population(sim, ContainerId(0), self.config.pop_size);
            sim.sync_down();
            debug!(replicas = self.population.len(), "created population");
        }

        let mut displaced = 0usize;
        while displaced == 0 {
            self.attempts += 1;
            displaced = match self.config.mode {
                DisplacementMode::Single => self.displace_single_mass(sim, sampler) as usize,
                DisplacementMode::Tiled => self.displace_group_mass(sim, sampler),
                DisplacementMode::Population => self.displace_pop_mass(sim, sampler) as usize,
                DisplacementMode::SplitPopulation => self.displace_split_pop_mass(sim, sampler),
            };
        }

        self.iterations += displaced as u64;
        self.total_attempts += self.attempts as u64;
        info!(
            iterations = self.iterations,
            attempts = self.attempts,
            "displacement accepted"
        );
    }

    /// Relaxes per config: bounded steps, or settle when `relaxation` is
    /// zero. Tracked-mass samples accumulate for the metric stream.
    fn relax_or_settle(&mut self, sim: &mut Simulation) {
        if self.config.relaxation == 0 {
            settle(sim, EQUILIBRIUM_EPS, None);
        } else {
            let samples = relax(sim, self.config.relaxation, &self.tracked);
            self.track_samples.extend(samples);
        }
    }

    // ─── Single-mass mode ─────────────────────────────────────

    /// One serial trial: snapshot, shift, relax, accept or restore.
    pub fn displace_single_mass(&mut self, sim: &mut Simulation, sampler: &mut Sampler) -> bool {
        sim.sync_up();

        // Snapshot everything a rejection must restore
        let mass_snap: Vec<(MassId, DVec3, DVec3, f64)> = sim
            .graph
            .masses()
            .map(|(id, m)| (id, m.pos, m.origpos, m.m))
            .collect();
        let spring_snap: Vec<(SpringId, f64, f64)> = sim
            .graph
            .springs()
            .map(|(id, s)| (id, s.rest, s.k))
            .collect();

        self.relax_or_settle(sim);
        let baseline = measure(sim, Scope::All);

        let Some(target) = pick_random_mass(sim, sampler) else {
            return false;
        };

        // Chunk: everything within the cutoff moves rigidly
        let mut chunk = vec![target];
        if self.config.chunk_cutoff > 0.0 {
            let center = sim.graph.mass(target).origpos;
            for (id, m) in sim.graph.masses() {
                if id != target && (m.origpos - center).length() < self.config.chunk_cutoff {
                    chunk.push(id);
                }
            }
            debug!(size = chunk.len(), "chunk shift");
        }

        let dx = self.dx * sampler.direction();
        let mut ok = true;
        for &m in &chunk {
            if !shift_mass(sim, m, dx) {
                ok = false;
                break;
            }
        }

        if ok {
            sim.sync_down();
            self.relax_or_settle(sim);
            let trial = measure(sim, Scope::All);
            debug!(baseline, trial, "single-mass trial");
            if trial < baseline {
                sim.sync_down();
                return true;
            }
        }

        // Reject: byte-exact restore of the snapshot
        for &(id, pos, orig, m) in &mass_snap {
            let mass = sim.graph.mass_mut(id);
            mass.pos = pos;
            mass.origpos = orig;
            mass.m = m;
            mass.vel = DVec3::ZERO;
        }
        for &(id, rest, k) in &spring_snap {
            let s = sim.graph.spring_mut(id);
            s.rest = rest;
            s.k = k;
            s.max_stress = 0.0;
        }
        sim.sync_down();
        false
    }
}

impl Optimizer for MassDisplacer {
    fn optimize(&mut self, sim: &mut Simulation, sampler: &mut Sampler) {
        MassDisplacer::optimize(self, sim, sampler);
    }
}

/// Objective in a scope: total energy × total length.
pub(crate) fn measure(sim: &Simulation, scope: Scope) -> f64 {
    let e = total_energy(sim, scope);
    assert_finite_energy(sim, e);
    e * total_length(sim, scope)
}

/// Uniformly picks a candidate mass, rejecting non-candidates.
/// Returns `None` when the graph has no candidate at all.
pub(crate) fn pick_random_mass(sim: &Simulation, sampler: &mut Sampler) -> Option<MassId> {
    let ids = sim.graph.mass_ids();
    if !ids.iter().any(|&id| sim.graph.mass(id).is_candidate()) {
        return None;
    }
    loop {
        let id = ids[sampler.index(ids.len())];
        if sim.graph.mass(id).is_candidate() {
            return Some(id);
        }
    }
}

/// Shifts a mass by `dx`: original and current position move, velocity
/// zeroes, every incident spring re-measures its rest between original
/// positions and rescales `k` to hold `k·rest` constant.
///
/// If any new rest would fall under the minimum, every touched spring is
/// restored and the shift reports failure.
pub fn shift_mass(sim: &mut Simulation, m: MassId, dx: DVec3) -> bool {
    let incident: Vec<SpringId> = sim
        .graph
        .springs()
        .filter(|(_, s)| s.touches(m))
        .map(|(id, _)| id)
        .collect();
    shift_mass_over(sim, m, dx, &incident)
}

/// Shift restricted to springs listed in one container (replica scope).
pub fn shift_container_mass(
    sim: &mut Simulation,
    container: ContainerId,
    index: usize,
    dx: DVec3,
) -> bool {
    let m = sim.graph.container(container).masses[index];
    let incident: Vec<SpringId> = sim
        .graph
        .container(container)
        .springs
        .iter()
        .copied()
        .filter(|&sid| sim.graph.spring(sid).touches(m))
        .collect();
    shift_mass_over(sim, m, dx, &incident)
}

fn shift_mass_over(sim: &mut Simulation, m: MassId, dx: DVec3, incident: &[SpringId]) -> bool {
    let new_orig = sim.graph.mass(m).origpos + dx;
    let mut touched: Vec<(SpringId, f64, f64)> = Vec::with_capacity(incident.len());

    for &sid in incident {
        let (other, rest_old, k_old) = {
            let s = sim.graph.spring(sid);
            (s.opposite(m), s.rest, s.k)
        };
        let rest_new = (sim.graph.mass(other).origpos - new_orig).length();
        if rest_new < MIN_REST {
            debug!(spring = sid.0, rest_new, "shift rejected: small rest");
            for &(tid, rest, k) in &touched {
                let s = sim.graph.spring_mut(tid);
                s.rest = rest;
                s.k = k;
            }
            return false;
        }
        touched.push((sid, rest_old, k_old));
        let s = sim.graph.spring_mut(sid);
        s.k = k_old * rest_old / rest_new;
        s.rest = rest_new;
    }

    let mass = sim.graph.mass_mut(m);
    mass.origpos += dx;
    mass.pos += dx;
    mass.vel = DVec3::ZERO;
    sim.mark_dirty();
    true
}
