//! Per-vertex record of the bucket- and FIFO-queue ES trees.

use crate::{Level, UNREACHABLE};
use dynreach_graph::{ArcId, DiGraph, VertexId};
use std::collections::{HashMap, VecDeque};

/// An occupied in-neighbor slot: the predecessor record and the arc through
/// which it was registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InSlot {
    pub pred: VertexId,
    pub arc: ArcId,
}

#[derive(Debug, Clone)]
pub(crate) struct EsVertexData {
    pub level: Level,
    /// In-neighbor table. Slot positions are stable: a vacated slot stays in
    /// place as `None` and is recycled LIFO by later insertions, so slot
    /// indices held elsewhere keep meaning the same entry.
    pub in_neighbors: Vec<Option<InSlot>>,
    /// Index of the chosen parent slot.
    pub parent_index: usize,
    recycled_slots: Vec<usize>,
}

impl Default for EsVertexData {
    fn default() -> Self {
        Self { level: UNREACHABLE, in_neighbors: Vec::new(), parent_index: 0, recycled_slots: Vec::new() }
    }
}

impl EsVertexData {
    pub fn is_reachable(&self) -> bool {
        self.level != UNREACHABLE
    }

    pub fn set_unreachable(&mut self) {
        self.parent_index = 0;
        self.level = UNREACHABLE;
    }

    /// The slot currently selected as parent; `None` if the record is
    /// unreachable, the index ran off the table, or the slot was vacated.
    pub fn parent_slot(&self) -> Option<InSlot> {
        if !self.is_reachable() || self.parent_index >= self.in_neighbors.len() {
            return None;
        }
        self.in_neighbors[self.parent_index]
    }

    /// Whether no predecessor is registered at all.
    pub fn has_no_in_neighbors(&self) -> bool {
        self.in_neighbors.iter().all(Option::is_none)
    }
}

/// Record store of an ES tree: one record per known vertex plus the
/// arc-owned slot table, which maps an arc to the 1-based slot it occupies
/// in its head's in-neighbor table.
#[derive(Debug, Default)]
pub(crate) struct EsTreeData {
    records: HashMap<VertexId, EsVertexData>,
    arc_slots: HashMap<ArcId, usize>,
}

impl EsTreeData {
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

    pub fn get(&self, v: VertexId) -> &EsVertexData {
        &self.records[&v]
    }

    pub fn get_mut(&mut self, v: VertexId) -> &mut EsVertexData {
        self.records.get_mut(&v).expect("record must exist")
    }

    pub fn level(&self, v: VertexId) -> Level {
        self.records[&v].level
    }

    pub fn is_reachable(&self, v: VertexId) -> bool {
        self.records.get(&v).is_some_and(EsVertexData::is_reachable)
    }

    pub fn parent(&self, v: VertexId) -> Option<VertexId> {
        self.get(v).parent_slot().map(|s| s.pred)
    }

    pub fn tree_arc(&self, v: VertexId) -> Option<ArcId> {
        self.get(v).parent_slot().map(|s| s.arc)
    }

    pub fn is_tree_arc(&self, head: VertexId, arc: ArcId) -> bool {
        self.tree_arc(head) == Some(arc)
    }

    /// Registers `arc` as an in-neighbor entry of `head`, recycling a
    /// vacated slot if one exists.
    pub fn add_in_neighbor(&mut self, head: VertexId, pred: VertexId, arc: ArcId) {
        debug_assert!(!self.arc_slots.contains_key(&arc));
        let record = self.get_mut(head);
        let slot = InSlot { pred, arc };
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
        self.arc_slots.insert(arc, index + 1);
    }

    /// Vacates the slot of `arc` in `head`'s table and pushes its index onto
    /// the recycling stack.
    pub fn remove_in_neighbor(&mut self, head: VertexId, arc: ArcId) {
        let index = self.arc_slots.remove(&arc).expect("arc must occupy a slot") - 1;
        let record = self.get_mut(head);
        debug_assert!(record.in_neighbors[index].is_some_and(|s| s.arc == arc));
        record.in_neighbors[index] = None;
        record.recycled_slots.push(index);
    }

    /// Re-parents `head` onto `pred` through `arc` if that strictly lowers
    /// its level, returning the level decrease; on a level tie the parent
    /// switches to the lower slot index. Returns 0 for a non-improving arc.
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

    /// Full initialization: BFS from `root` seeding levels and tree arcs,
    /// then a sweep registering every remaining non-tree arc, then a sweep
    /// creating records for untouched vertices.
    pub fn initialize(&mut self, graph: &DiGraph, root: VertexId) {
        self.clear();
        self.ensure(root);
        self.get_mut(root).level = 0;

        let mut queue = VecDeque::from([root]);
        while let Some(t) = queue.pop_front() {
            let t_level = self.level(t);
            let mut discovered = Vec::new();
            graph.map_outgoing_arcs(t, |a, _, h| {
                if h == t || h == root {
                    return;
                }
                if !self.contains(h) {
                    let record = self.records.entry(h).or_default();
                    record.level = t_level + 1;
                    record.in_neighbors.push(Some(InSlot { pred: t, arc: a }));
                    self.arc_slots.insert(a, 1);
                    discovered.push(h);
                } else {
                    self.add_in_neighbor(h, t, a);
                }
            });
            queue.extend(discovered);
        }

        // arcs out of unreached vertices were not seen by the BFS
        graph.map_arcs(|a, t, h| {
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
