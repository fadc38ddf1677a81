//! Mass → incident-spring map.
//!
//! The spring remover owns one of these and repairs it after every
//! deletion; the map is the source of truth for the hanging-limb sweep,
//! which runs ahead of the arena commits.

use std::collections::HashMap;

use forma_types::{MassId, SpringId};

use crate::model::LatticeGraph;

/// Incidence map from mass ids to the springs that touch them.
#[derive(Debug, Clone, Default)]
pub struct Incidence {
    map: HashMap<MassId, Vec<SpringId>>,
}

impl Incidence {
    /// Builds the map from every live spring in the graph.
    pub fn build(graph: &LatticeGraph) -> Self {
        let mut map: HashMap<MassId, Vec<SpringId>> = HashMap::new();
        for (id, _) in graph.masses() {
            map.entry(id).or_default();
        }
        for (sid, s) in graph.springs() {
            map.entry(s.left).or_default().push(sid);
            map.entry(s.right).or_default().push(sid);
        }
        Self { map }
    }

    /// Springs currently incident to `m`. Unknown masses have none.
    pub fn incident(&self, m: MassId) -> &[SpringId] {
        self.map.get(&m).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Incidence degree of `m`.
    pub fn degree(&self, m: MassId) -> usize {
        self.incident(m).len()
    }

    /// Detaches a spring from both endpoint lists. Call before (or
    /// instead of) the arena deletion; the map never holds stale ids.
    pub fn detach(&mut self, sid: SpringId, left: MassId, right: MassId) {
        if let Some(list) = self.map.get_mut(&left) {
            list.retain(|&s| s != sid);
        }
        if let Some(list) = self.map.get_mut(&right) {
            list.retain(|&s| s != sid);
        }
    }

    /// Attaches a spring to both endpoint lists.
    pub fn attach(&mut self, sid: SpringId, left: MassId, right: MassId) {
        self.map.entry(left).or_default().push(sid);
        self.map.entry(right).or_default().push(sid);
    }

    /// Checks the map against the graph: every live spring listed at both
    /// endpoints and list lengths equal to each mass's counter.
    pub fn consistent_with(&self, graph: &LatticeGraph) -> bool {
        for (sid, s) in graph.springs() {
            if !self.incident(s.left).contains(&sid) || !self.incident(s.right).contains(&sid) {
                return false;
            }
        }
        for (mid, m) in graph.masses() {
            if self.degree(mid) != m.spring_count as usize {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Mass, Spring};
    use glam::DVec3;

    #[test]
    fn build_matches_graph_counters() {
        let mut g = LatticeGraph::new();
        let a = g.add_mass(Mass::new(DVec3::ZERO, 1.0));
        let b = g.add_mass(Mass::new(DVec3::X, 1.0));
        let c = g.add_mass(Mass::new(DVec3::Y, 1.0));
        g.add_spring(Spring::new(a, b, 1.0, 1.0));
        g.add_spring(Spring::new(b, c, 1.0, 1.0));

        let inc = Incidence::build(&g);
        assert!(inc.consistent_with(&g));
        assert_eq!(inc.degree(b), 2);
    }

    #[test]
    fn detach_keeps_map_consistent() {
        let mut g = LatticeGraph::new();
        let a = g.add_mass(Mass::new(DVec3::ZERO, 1.0));
        let b = g.add_mass(Mass::new(DVec3::X, 1.0));
        let sid = g.add_spring(Spring::new(a, b, 1.0, 1.0));

        let mut inc = Incidence::build(&g);
        inc.detach(sid, a, b);
        g.remove_spring(sid);
        assert!(inc.consistent_with(&g));
        assert_eq!(inc.degree(a), 0);
    }
}
