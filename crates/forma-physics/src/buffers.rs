//! Device-side SoA buffers.
//!
//! Buffers are laid out per arena *slot* (vacated slots carry an alive
//! flag) so spring endpoint indices remain valid without compaction.
//! All channels are rebuilt on `sync_down` and read back on `sync_up`.

use glam::DVec3;

use forma_graph::LatticeGraph;

/// SoA state mirroring the graph on the integration side.
#[derive(Debug, Clone, Default)]
pub struct DeviceBuffers {
    // ─── Per mass slot ───
    pub pos: Vec<DVec3>,
    pub vel: Vec<DVec3>,
    pub acc: Vec<DVec3>,
    pub extforce: Vec<DVec3>,
    pub extduration: Vec<f64>,
    pub m: Vec<f64>,
    pub fixed: Vec<bool>,
    pub mass_alive: Vec<bool>,
    /// Per-substep force accumulator.
    pub force: Vec<DVec3>,

    // ─── Per spring slot ───
    pub left: Vec<u32>,
    pub right: Vec<u32>,
    pub rest: Vec<f64>,
    pub k: Vec<f64>,
    pub spring_force: Vec<f64>,
    pub max_stress: Vec<f64>,
    pub compute: Vec<bool>,
    pub spring_alive: Vec<bool>,
}

impl DeviceBuffers {
    /// Rebuilds every channel from the graph (host → device).
    pub fn load_from(&mut self, graph: &LatticeGraph) {
        let nm = graph.mass_slots();
        let ns = graph.spring_slots();

        self.pos = vec![DVec3::ZERO; nm];
        self.vel = vec![DVec3::ZERO; nm];
        self.acc = vec![DVec3::ZERO; nm];
        self.extforce = vec![DVec3::ZERO; nm];
        self.extduration = vec![0.0; nm];
        self.m = vec![0.0; nm];
        self.fixed = vec![false; nm];
        self.mass_alive = vec![false; nm];
        self.force = vec![DVec3::ZERO; nm];

        for (id, mass) in graph.masses() {
            let i = id.index();
            self.pos[i] = mass.pos;
            self.vel[i] = mass.vel;
            self.acc[i] = mass.acc;
            self.extforce[i] = mass.extforce;
            self.extduration[i] = mass.extduration;
            self.m[i] = mass.m;
            self.fixed[i] = mass.fixed;
            self.mass_alive[i] = true;
        }

        self.left = vec![0; ns];
        self.right = vec![0; ns];
        self.rest = vec![0.0; ns];
        self.k = vec![0.0; ns];
        self.spring_force = vec![0.0; ns];
        self.max_stress = vec![0.0; ns];
        self.compute = vec![false; ns];
        self.spring_alive = vec![false; ns];

        for (id, s) in graph.springs() {
            let i = id.index();
            self.left[i] = s.left.0;
            self.right[i] = s.right.0;
            self.rest[i] = s.rest;
            self.k[i] = s.k;
            self.spring_force[i] = s.force;
            self.max_stress[i] = s.max_stress;
            self.compute[i] = s.compute;
            self.spring_alive[i] = true;
        }
    }

    /// Writes dynamic state back into the graph (device → host).
    ///
    /// Topology channels (`rest`, `k`, endpoints) are host-owned and are
    /// not copied back.
    pub fn store_into(&self, graph: &mut LatticeGraph) {
        for (id, mass) in graph.masses_mut() {
            let i = id.index();
            mass.pos = self.pos[i];
            mass.vel = self.vel[i];
            mass.acc = self.acc[i];
            mass.extduration = self.extduration[i];
        }
        for (id, s) in graph.springs_mut() {
            let i = id.index();
            s.force = self.spring_force[i];
            s.max_stress = self.max_stress[i];
        }
    }
}
