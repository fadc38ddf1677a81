//! Graph model — masses, springs, containers, and the owning arenas.
//!
//! Masses and springs live in slot arenas (`Vec<Option<T>>` plus a free
//! list). Ids are positional and stay valid across deletions of other
//! entities; dereferencing a deleted id is a programmer error.
//!
//! A [`Container`] is a logical partition: it shares the arenas with the
//! simulation and holds only id lists. Replica populations are built from
//! containers so one integrator pass advances all of them.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use forma_types::constants::EXT_FORCE_EPS;
use forma_types::{ContainerId, MassId, SpringId};

/// A point mass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mass {
    /// Current position.
    pub pos: DVec3,
    /// Position the mass was created at; rest lengths are measured
    /// between original positions.
    pub origpos: DVec3,
    pub vel: DVec3,
    pub acc: DVec3,
    /// External force applied while `extduration` has not elapsed.
    pub extforce: DVec3,
    /// Remaining external-force duration in seconds (∞ = forever).
    pub extduration: f64,
    /// Scalar mass.
    pub m: f64,
    /// Fixed masses never move.
    pub fixed: bool,
    /// Number of live incident springs.
    pub spring_count: u32,
}

impl Mass {
    /// Creates a free mass of weight `m` at `pos`.
    pub fn new(pos: DVec3, m: f64) -> Self {
        Self {
            pos,
            origpos: pos,
            vel: DVec3::ZERO,
            acc: DVec3::ZERO,
            extforce: DVec3::ZERO,
            extduration: 0.0,
            m,
            fixed: false,
            spring_count: 0,
        }
    }

    /// True if the mass carries a non-negligible external load.
    pub fn loaded(&self) -> bool {
        self.extforce.length() > EXT_FORCE_EPS
    }

    /// True if the mass may be relocated by the displacer: unloaded,
    /// unfixed, and attached to at least one spring. Tile-edge exclusion
    /// is applied by the group builder on top of this.
    pub fn is_candidate(&self) -> bool {
        !self.loaded() && !self.fixed && self.spring_count > 0
    }

    pub fn fix(&mut self) {
        self.fixed = true;
    }

    pub fn unfix(&mut self) {
        self.fixed = false;
    }
}

/// An undirected elastic bar between two masses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spring {
    pub left: MassId,
    pub right: MassId,
    /// Unloaded length. Structural mutations rescale `k` so that
    /// `k * rest` stays constant.
    pub rest: f64,
    /// Stiffness.
    pub k: f64,
    /// Current scalar internal force (tension positive), synced from the
    /// integrator.
    pub force: f64,
    /// Running maximum of `|force|` since the last decay/reset.
    pub max_stress: f64,
    /// Bar diameter, carried through to export.
    pub diam: f64,
    /// Force at which the bar is considered failed.
    pub break_force: f64,
    /// Springs with `compute == false` are skipped by the integrator.
    pub compute: bool,
}

impl Spring {
    /// Creates a spring with explicit endpoints and rest length.
    pub fn new(left: MassId, right: MassId, rest: f64, k: f64) -> Self {
        Self {
            left,
            right,
            rest,
            k,
            force: 0.0,
            max_stress: 0.0,
            diam: 0.0,
            break_force: f64::INFINITY,
            compute: true,
        }
    }

    /// Clones structural constants (`k·rest` product, diameter, break
    /// force) from a template onto new endpoints. The caller sets `rest`
    /// afterwards; stiffness is rescaled to preserve the template's
    /// `k·rest`.
    pub fn from_template(template: &Spring, left: MassId, right: MassId, rest: f64) -> Self {
        let mut s = template.clone();
        s.left = left;
        s.right = right;
        s.force = 0.0;
        s.max_stress = 0.0;
        if rest > 0.0 {
            s.k = template.k * template.rest / rest;
            s.rest = rest;
        }
        s
    }

    /// The other endpoint of the bar.
    pub fn opposite(&self, m: MassId) -> MassId {
        if self.left == m {
            self.right
        } else {
            self.left
        }
    }

    /// True if `m` is one of the endpoints.
    pub fn touches(&self, m: MassId) -> bool {
        self.left == m || self.right == m
    }

    /// Elastic energy at the current internal force: `force² / k`.
    pub fn energy(&self) -> f64 {
        self.force * self.force / self.k
    }
}

/// Structural constants shared by every bar of a lattice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarParams {
    /// Stiffness of a unit-length bar; actual stiffness is `k_unit / rest`.
    pub k_unit: f64,
    /// Per-mass weight.
    pub mass: f64,
    /// Bar diameter.
    pub diam: f64,
    /// Break force threshold.
    pub break_force: f64,
}

impl Default for BarParams {
    fn default() -> Self {
        Self {
            k_unit: 1.0e4,
            mass: 0.1,
            diam: 0.002,
            break_force: f64::INFINITY,
        }
    }
}

/// A logical subgraph sharing the simulation's arenas.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Container {
    pub masses: Vec<MassId>,
    pub springs: Vec<SpringId>,
}

impl Container {
    pub fn add_mass(&mut self, m: MassId) {
        self.masses.push(m);
    }

    pub fn add_spring(&mut self, s: SpringId) {
        self.springs.push(s);
    }

    pub fn remove_spring(&mut self, s: SpringId) {
        self.springs.retain(|&id| id != s);
    }
}

/// The owning graph: slot arenas for masses and springs plus containers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatticeGraph {
    masses: Vec<Option<Mass>>,
    springs: Vec<Option<Spring>>,
    free_masses: Vec<u32>,
    free_springs: Vec<u32>,
    pub containers: Vec<Container>,
}

impl LatticeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Masses ───────────────────────────────────────────────

    /// Inserts a mass, reusing a vacated slot when one exists.
    pub fn add_mass(&mut self, mass: Mass) -> MassId {
        if let Some(slot) = self.free_masses.pop() {
            self.masses[slot as usize] = Some(mass);
            MassId(slot)
        } else {
            self.masses.push(Some(mass));
            MassId(self.masses.len() as u32 - 1)
        }
    }

    /// Removes a mass. The caller must have detached or re-pointed every
    /// incident spring first.
    pub fn remove_mass(&mut self, id: MassId) -> Mass {
        let m = self.masses[id.index()]
            .take()
            .expect("removing a dead mass");
        self.free_masses.push(id.0);
        for c in &mut self.containers {
            c.masses.retain(|&mid| mid != id);
        }
        m
    }

    pub fn mass(&self, id: MassId) -> &Mass {
        self.masses[id.index()].as_ref().expect("stale mass id")
    }

    pub fn mass_mut(&mut self, id: MassId) -> &mut Mass {
        self.masses[id.index()].as_mut().expect("stale mass id")
    }

    pub fn try_mass(&self, id: MassId) -> Option<&Mass> {
        self.masses.get(id.index()).and_then(|m| m.as_ref())
    }

    /// Live masses in id order.
    pub fn masses(&self) -> impl Iterator<Item = (MassId, &Mass)> {
        self.masses
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.as_ref().map(|m| (MassId(i as u32), m)))
    }

    pub fn masses_mut(&mut self) -> impl Iterator<Item = (MassId, &mut Mass)> {
        self.masses
            .iter_mut()
            .enumerate()
            .filter_map(|(i, m)| m.as_mut().map(|m| (MassId(i as u32), m)))
    }

    pub fn mass_ids(&self) -> Vec<MassId> {
        self.masses().map(|(id, _)| id).collect()
    }

    pub fn n_masses(&self) -> usize {
        self.masses.iter().filter(|m| m.is_some()).count()
    }

    /// Upper bound on mass slot indices (including vacated slots).
    pub fn mass_slots(&self) -> usize {
        self.masses.len()
    }

    // ─── Springs ──────────────────────────────────────────────

    /// Inserts a spring and bumps both endpoint incidence counters.
    pub fn add_spring(&mut self, spring: Spring) -> SpringId {
        self.mass_mut(spring.left).spring_count += 1;
        self.mass_mut(spring.right).spring_count += 1;
        if let Some(slot) = self.free_springs.pop() {
            self.springs[slot as usize] = Some(spring);
            SpringId(slot)
        } else {
            self.springs.push(Some(spring));
            SpringId(self.springs.len() as u32 - 1)
        }
    }

    /// Removes a spring from the arena and from every container, and
    /// decrements endpoint incidence counters.
    pub fn remove_spring(&mut self, id: SpringId) -> Spring {
        let s = self.springs[id.index()]
            .take()
            .expect("removing a dead spring");
        self.free_springs.push(id.0);
        self.mass_mut(s.left).spring_count -= 1;
        self.mass_mut(s.right).spring_count -= 1;
        for c in &mut self.containers {
            c.remove_spring(id);
        }
        s
    }

    pub fn spring(&self, id: SpringId) -> &Spring {
        self.springs[id.index()].as_ref().expect("stale spring id")
    }

    pub fn spring_mut(&mut self, id: SpringId) -> &mut Spring {
        self.springs[id.index()].as_mut().expect("stale spring id")
    }

    pub fn try_spring(&self, id: SpringId) -> Option<&Spring> {
        self.springs.get(id.index()).and_then(|s| s.as_ref())
    }

    /// Live springs in id order.
    pub fn springs(&self) -> impl Iterator<Item = (SpringId, &Spring)> {
        self.springs
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (SpringId(i as u32), s)))
    }

    pub fn springs_mut(&mut self) -> impl Iterator<Item = (SpringId, &mut Spring)> {
        self.springs
            .iter_mut()
            .enumerate()
            .filter_map(|(i, s)| s.as_mut().map(|s| (SpringId(i as u32), s)))
    }

    pub fn spring_ids(&self) -> Vec<SpringId> {
        self.springs().map(|(id, _)| id).collect()
    }

    pub fn n_springs(&self) -> usize {
        self.springs.iter().filter(|s| s.is_some()).count()
    }

    pub fn spring_slots(&self) -> usize {
        self.springs.len()
    }

    /// True if any live spring connects `a` and `b`.
    pub fn spring_exists(&self, a: MassId, b: MassId) -> bool {
        self.springs()
            .any(|(_, s)| (s.left == a && s.right == b) || (s.left == b && s.right == a))
    }

    /// Re-points one endpoint of a spring, keeping incidence counters
    /// consistent. Does not touch `rest` or `k`.
    pub fn repoint_spring(&mut self, id: SpringId, from: MassId, to: MassId) {
        {
            let s = self.spring_mut(id);
            if s.left == from {
                s.left = to;
            } else if s.right == from {
                s.right = to;
            } else {
                panic!("repointing a spring that does not touch the mass");
            }
        }
        self.mass_mut(from).spring_count -= 1;
        self.mass_mut(to).spring_count += 1;
    }

    // ─── Containers ───────────────────────────────────────────

    pub fn add_container(&mut self) -> ContainerId {
        self.containers.push(Container::default());
        ContainerId(self.containers.len() as u32 - 1)
    }

    pub fn container(&self, id: ContainerId) -> &Container {
        &self.containers[id.index()]
    }

    pub fn container_mut(&mut self, id: ContainerId) -> &mut Container {
        &mut self.containers[id.index()]
    }

    // ─── Aggregates ───────────────────────────────────────────

    /// Axis-aligned bounding box over current positions.
    pub fn bounding_box(&self) -> (DVec3, DVec3) {
        let mut min = DVec3::splat(f64::MAX);
        let mut max = DVec3::splat(f64::MIN);
        for (_, m) in self.masses() {
            min = min.min(m.pos);
            max = max.max(m.pos);
        }
        (min, max)
    }

    /// Center of the bounding box.
    pub fn center(&self) -> DVec3 {
        let (min, max) = self.bounding_box();
        0.5 * (min + max)
    }

    pub fn total_mass(&self) -> f64 {
        self.masses().map(|(_, m)| m.m).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_bar_graph() -> (LatticeGraph, MassId, MassId, MassId) {
        let mut g = LatticeGraph::new();
        let a = g.add_mass(Mass::new(DVec3::ZERO, 1.0));
        let b = g.add_mass(Mass::new(DVec3::X, 1.0));
        let c = g.add_mass(Mass::new(DVec3::X * 2.0, 1.0));
        g.add_spring(Spring::new(a, b, 1.0, 1.0));
        g.add_spring(Spring::new(b, c, 1.0, 1.0));
        (g, a, b, c)
    }

    #[test]
    fn incidence_counters_track_insert_and_remove() {
        let (mut g, a, b, _c) = two_bar_graph();
        assert_eq!(g.mass(a).spring_count, 1);
        assert_eq!(g.mass(b).spring_count, 2);

        let first = g.spring_ids()[0];
        g.remove_spring(first);
        assert_eq!(g.mass(a).spring_count, 0);
        assert_eq!(g.mass(b).spring_count, 1);
        assert_eq!(g.n_springs(), 1);
    }

    #[test]
    fn slots_are_reused_after_removal() {
        let (mut g, a, b, _c) = two_bar_graph();
        let first = g.spring_ids()[0];
        g.remove_spring(first);
        let replacement = g.add_spring(Spring::new(a, b, 1.0, 1.0));
        assert_eq!(replacement, first);
        assert_eq!(g.n_springs(), 2);
    }

    #[test]
    fn container_views_are_pruned_on_deletion() {
        let (mut g, _a, _b, _c) = two_bar_graph();
        let cid = g.add_container();
        let all: Vec<_> = g.spring_ids();
        for &s in &all {
            g.container_mut(cid).add_spring(s);
        }
        g.remove_spring(all[0]);
        assert_eq!(g.container(cid).springs, vec![all[1]]);
    }

    #[test]
    fn template_clone_preserves_k_rest() {
        let (mut g, a, _b, c) = two_bar_graph();
        let tpl = g.spring(g.spring_ids()[0]).clone();
        let product = tpl.k * tpl.rest;
        let s = Spring::from_template(&tpl, a, c, 2.0);
        assert!((s.k * s.rest - product).abs() < 1e-12);
        g.add_spring(s);
    }
}
