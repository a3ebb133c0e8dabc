//! Per-vertex record of the multi-level ES tree.
//!
//! Unlike the plain ES record, a slot here stands for a *predecessor
//! vertex*, not for a single arc: parallel arcs share the slot and bump its
//! multiplicity, so the table does not grow with multi-edges.

use crate::{Level, UNREACHABLE};
use dynreach_graph::{ArcId, DiGraph, VertexId};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MlSlot {
    pub pred: VertexId,
    pub count: u64,
}

#[derive(Debug, Clone)]
pub(crate) struct MlVertexData {
    pub level: Level,
    pub in_neighbors: Vec<Option<MlSlot>>,
    pub parent_index: usize,
    recycled_slots: Vec<usize>,
    /// 1-based slot index per predecessor vertex, for O(1) coalescing of
    /// parallel arcs.
    slot_by_pred: HashMap<VertexId, usize>,
}

impl Default for MlVertexData {
    fn default() -> Self {
        Self {
            level: UNREACHABLE,
            in_neighbors: Vec::new(),
            parent_index: 0,
            recycled_slots: Vec::new(),
            slot_by_pred: HashMap::new(),
        }
    }
}

impl MlVertexData {
    pub fn is_reachable(&self) -> bool {
        self.level != UNREACHABLE
    }

    pub fn set_unreachable(&mut self) {
        self.parent_index = 0;
        self.level = UNREACHABLE;
    }

    pub fn parent_slot(&self) -> Option<MlSlot> {
        if !self.is_reachable() || self.parent_index >= self.in_neighbors.len() {
            return None;
        }
        self.in_neighbors[self.parent_index]
    }

    pub fn has_no_in_neighbors(&self) -> bool {
        self.in_neighbors.iter().all(Option::is_none)
    }
}

/// Record store of the multi-level tree: records plus the arc-owned slot
/// table (1-based slot of each arc in its head's in-neighbor table; parallel
/// arcs map to the same slot).
#[derive(Debug, Default)]
pub(crate) struct MlTreeData {
    records: HashMap<VertexId, MlVertexData>,
    arc_slots: HashMap<ArcId, usize>,
}

impl MlTreeData {
    pub fn clear(&mut self) {
        self.records.clear();
        self.arc_slots.clear();
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

    pub fn get(&self, v: VertexId) -> &MlVertexData {
        &self.records[&v]
    }

    pub fn get_mut(&mut self, v: VertexId) -> &mut MlVertexData {
        self.records.get_mut(&v).expect("record must exist")
    }

    pub fn level(&self, v: VertexId) -> Level {
        self.records[&v].level
    }

    pub fn is_reachable(&self, v: VertexId) -> bool {
        self.records.get(&v).is_some_and(MlVertexData::is_reachable)
    }

    pub fn parent(&self, v: VertexId) -> Option<VertexId> {
        self.get(v).parent_slot().map(|s| s.pred)
    }

    pub fn is_parent(&self, head: VertexId, pred: VertexId) -> bool {
        self.parent(head) == Some(pred)
    }

    /// Registers `arc` in `head`'s table. Returns `true` if the
    /// predecessor already had a slot and only its multiplicity grew.
    pub fn add_in_neighbor(&mut self, head: VertexId, pred: VertexId, arc: ArcId) -> bool {
        debug_assert!(!self.arc_slots.contains_key(&arc));
        let record = self.get_mut(head);
        if let Some(&slot) = record.slot_by_pred.get(&pred) {
            record.in_neighbors[slot - 1].as_mut().unwrap().count += 1;
            self.arc_slots.insert(arc, slot);
            return true;
        }
        let slot = MlSlot { pred, count: 1 };
        let index = match record.recycled_slots.pop() {
            Some(i) => {
                debug_assert!(record.in_neighbors[i].is_none());
                record.in_neighbors[i] = Some(slot);
                i
            }
            None => {
                record.in_neighbors.push(Some(slot));
                record.in_neighbors.len() - 1
            }
        };
        record.slot_by_pred.insert(pred, index + 1);
        self.arc_slots.insert(arc, index + 1);
        false
    }

    /// Unregisters `arc` from `head`'s table. Returns `true` if the slot
    /// survives through a parallel copy; only at multiplicity zero the slot
    /// is vacated and recycled.
    pub fn remove_in_neighbor(&mut self, head: VertexId, arc: ArcId) -> bool {
        let index = self.arc_slots.remove(&arc).expect("arc must occupy a slot") - 1;
        let record = self.get_mut(head);
        let slot = record.in_neighbors[index].as_mut().expect("occupied slot");
        slot.count -= 1;
        if slot.count > 0 {
            return true;
        }
        let pred = slot.pred;
        record.in_neighbors[index] = None;
        record.slot_by_pred.remove(&pred);
        record.recycled_slots.push(index);
        false
    }

    /// Identical improvement rule to the plain ES record, with ties broken
    /// towards the lower slot index.
    pub fn reparent(&mut self, head: VertexId, pred: VertexId, arc: ArcId) -> Level {
        let pred_level = self.level(pred);
        let record = &self.records[&head];
        if pred_level >= record.level {
            return 0;
        }
        let index = self.arc_slots[&arc] - 1;
        let record = self.get_mut(head);
        if pred_level + 1 < record.level {
            record.parent_index = index;
            let diff = record.level - (pred_level + 1);
            record.level = pred_level + 1;
            diff
        } else {
            if index < record.parent_index {
                record.parent_index = index;
            }
            0
        }
    }

    pub fn check_integrity(&self, v: VertexId) -> bool {
        let record = self.get(v);
        if record.is_reachable() {
            record.level == 0 || record.parent_slot().is_some_and(|s| self.level(s.pred).checked_add(1) == Some(record.level))
        } else {
            record.parent_slot().is_none()
        }
    }

    /// Full initialization, optionally against reversed arc directions.
    pub fn initialize(&mut self, graph: &DiGraph, root: VertexId, reversed: bool) {
        self.clear();
        self.ensure(root);
        self.get_mut(root).level = 0;

        let effective = |t: VertexId, h: VertexId| if reversed { (h, t) } else { (t, h) };

        let mut queue = VecDeque::from([root]);
        while let Some(t) = queue.pop_front() {
            let t_level = self.level(t);
            let mut discovered = Vec::new();
            let mut visit = |a: ArcId, pt: VertexId, ph: VertexId| {
                let (_, h) = effective(pt, ph);
                if h == t || h == root {
                    return;
                }
                if !self.contains(h) {
                    let record = self.records.entry(h).or_default();
                    record.level = t_level + 1;
                    record.in_neighbors.push(Some(MlSlot { pred: t, count: 1 }));
                    record.slot_by_pred.insert(t, 1);
                    self.arc_slots.insert(a, 1);
                    discovered.push(h);
                } else {
                    self.add_in_neighbor(h, t, a);
                }
            };
            if reversed {
                graph.map_incoming_arcs(t, &mut visit);
            } else {
                graph.map_outgoing_arcs(t, &mut visit);
            }
            queue.extend(discovered);
        }

        graph.map_arcs(|a, pt, ph| {
            let (t, h) = effective(pt, ph);
            if t == h || h == root {
                return;
            }
            self.ensure(t);
            self.ensure(h);
            if !self.is_reachable(t) {
                self.add_in_neighbor(h, t, a);
            }
        });

        graph.map_vertices(|v| self.ensure(v));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynreach_graph::DiGraph;

    #[test]
    fn test_parallel_arcs_share_a_slot() {
        let mut g = DiGraph::new();
        let u = g.add_vertex();
        let v = g.add_vertex();
        let a1 = g.add_arc(u, v);
        let a2 = g.add_arc(u, v);

        let mut data = MlTreeData::default();
        data.ensure(u);
        data.ensure(v);
        assert!(!data.add_in_neighbor(v, u, a1));
        assert!(data.add_in_neighbor(v, u, a2));
        assert_eq!(data.get(v).in_neighbors.iter().flatten().count(), 1);
        assert_eq!(data.get(v).in_neighbors[0].unwrap().count, 2);

        // removing one copy keeps the slot, removing the last vacates it
        assert!(data.remove_in_neighbor(v, a1));
        assert_eq!(data.get(v).in_neighbors[0].unwrap().count, 1);
        assert!(!data.remove_in_neighbor(v, a2));
        assert_eq!(data.get(v).in_neighbors[0], None);
    }

    #[test]
    fn test_reversed_initialization() {
        // 0 <- 1 <- 2 seen as sink tree of 0
        let mut g = DiGraph::new();
        let vs: Vec<_> = (0..3).map(|_| g.add_vertex()).collect();
        g.add_arc(vs[1], vs[0]);
        g.add_arc(vs[2], vs[1]);

        let mut data = MlTreeData::default();
        data.initialize(&g, vs[0], true);
        assert_eq!(data.level(vs[0]), 0);
        assert_eq!(data.level(vs[1]), 1);
        assert_eq!(data.level(vs[2]), 2);
        assert_eq!(data.parent(vs[2]), Some(vs[1]));
    }
}
