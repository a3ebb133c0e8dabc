use crate::{Level, UNREACHABLE};
use dynreach_graph::{ArcId, DiGraph, VertexId};
use std::collections::{HashMap, VecDeque};

/// Record of the simple ES tree: a direct parent pointer plus the tree arc.
/// No in-neighbor table is kept; restoration rescans the actual incoming
/// arcs through the graph.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SesVertexData {
    pub level: Level,
    pub parent: Option<VertexId>,
    pub tree_arc: Option<ArcId>,
}

impl Default for SesVertexData {
    fn default() -> Self {
        Self { level: UNREACHABLE, parent: None, tree_arc: None }
    }
}

impl SesVertexData {
    pub fn is_reachable(&self) -> bool {
        self.level != UNREACHABLE
    }

    pub fn set_unreachable(&mut self) {
        self.parent = None;
        self.tree_arc = None;
        self.level = UNREACHABLE;
    }
}

#[derive(Debug, Default)]
pub(crate) struct SesTreeData {
    records: HashMap<VertexId, SesVertexData>,
}

impl SesTreeData {
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn contains(&self, v: VertexId) -> bool {
        self.records.contains_key(&v)
    }

    pub fn ensure(&mut self, v: VertexId) {
        self.records.entry(v).or_default();
    }

    pub fn remove(&mut self, v: VertexId) {
        self.records.remove(&v);
    }

    pub fn get(&self, v: VertexId) -> SesVertexData {
        self.records[&v]
    }

    pub fn get_mut(&mut self, v: VertexId) -> &mut SesVertexData {
        self.records.get_mut(&v).expect("record must exist")
    }

    pub fn level(&self, v: VertexId) -> Level {
        self.records[&v].level
    }

    pub fn is_reachable(&self, v: VertexId) -> bool {
        self.records.get(&v).is_some_and(SesVertexData::is_reachable)
    }

    pub fn is_tree_arc(&self, v: VertexId, arc: ArcId) -> bool {
        self.records.get(&v).is_some_and(|r| r.tree_arc == Some(arc))
    }

    pub fn has_valid_parent(&self, v: VertexId) -> bool {
        // the parent itself may have sunk to unreachable in the meantime
        self.get(v).parent.is_some_and(|p| self.level(p).checked_add(1) == Some(self.level(v)))
    }

    pub fn set_parent(&mut self, v: VertexId, parent: VertexId, arc: ArcId) {
        let parent_level = self.level(parent);
        let record = self.get_mut(v);
        record.parent = Some(parent);
        record.tree_arc = Some(arc);
        record.level = parent_level + 1;
    }

    pub fn num_reachable(&self) -> usize {
        self.records.values().filter(|r| r.is_reachable()).count()
    }

    pub fn max_level(&self) -> Level {
        self.records.values().filter(|r| r.is_reachable()).map(|r| r.level).max().unwrap_or(0)
    }

    /// Full initialization: plain BFS from `root`, then default records for
    /// everything the BFS did not reach.
    pub fn initialize(&mut self, graph: &DiGraph, root: VertexId, reversed: bool) {
        self.clear();
        self.ensure(root);
        self.get_mut(root).level = 0;

        let mut queue = VecDeque::from([root]);
        while let Some(t) = queue.pop_front() {
            let mut discovered = Vec::new();
            let mut visit = |a: ArcId, pt: VertexId, ph: VertexId| {
                let h = if reversed { pt } else { ph };
                if h == t || h == root || self.contains(h) {
                    return;
                }
                self.ensure(h);
                self.set_parent(h, t, a);
                discovered.push(h);
            };
            if reversed {
                graph.map_incoming_arcs(t, &mut visit);
            } else {
                graph.map_outgoing_arcs(t, &mut visit);
            }
            queue.extend(discovered);
        }

        graph.map_vertices(|v| self.ensure(v));
    }
}
