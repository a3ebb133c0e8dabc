//! Even–Shiloach tree with a full minimum-parent rescan on level changes.

use super::ml_data::MlTreeData;
use super::{EsTreeCounters, EsTreeParams};
use crate::algorithm::{ArcEvent, DynamicDiGraphAlgorithm, DynamicSsReachAlgorithm};
use crate::errors::{ReachabilityError, Result};
use crate::queues::BoundedFifo;
use crate::{Level, UNREACHABLE};
use dynreach_graph::{ArcId, DiGraph, VertexId};
use log::{debug, trace};
use std::collections::{HashMap, HashSet, VecDeque};

struct Scratch {
    queue: BoundedFifo,
    times_in_queue: HashMap<VertexId, u32>,
    limit_reached: bool,
}

impl Scratch {
    fn enqueue(&mut self, x: VertexId, requeue_limit: u32, max_requeued: &mut u64) {
        let times = self.times_in_queue.entry(x).or_insert(0);
        *times += 1;
        if *times <= requeue_limit {
            *max_requeued = (*max_requeued).max(u64::from(*times));
            self.queue.push_back(x);
        } else {
            self.limit_reached = true;
        }
        if self.queue.limit_reached() {
            self.limit_reached = true;
        }
    }
}

/// ES-tree maintenance that pays extra scanning for better parent choices.
///
/// When processing a vertex whose level must rise, the walk does not stop at
/// the first admissible parent: it wraps around the whole in-neighbor table,
/// tracks the minimum-level slot (ties to the lower index), and settles the
/// vertex directly at `min_parent_level + 1`. Parallel arcs are counted per
/// slot, so multi-edges do not bloat the table. With `reversed`, every arc
/// is interpreted backwards and the tree answers single-sink reachability.
pub struct MultiLevelEsTree {
    data: MlTreeData,
    params: EsTreeParams,
    counters: EsTreeCounters,
    reversed: bool,
    source: Option<VertexId>,
    root: Option<VertexId>,
    initialized: bool,
    auto_update: bool,
}

impl Default for MultiLevelEsTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiLevelEsTree {
    pub fn new() -> Self {
        Self::with_params(EsTreeParams::default())
    }

    pub fn with_params(params: EsTreeParams) -> Self {
        Self {
            data: MlTreeData::default(),
            params,
            counters: EsTreeCounters::default(),
            reversed: false,
            source: None,
            root: None,
            initialized: false,
            auto_update: true,
        }
    }

    /// Interprets every arc in reverse, turning the maintainer into a
    /// single-sink reachability oracle.
    pub fn reversed(params: EsTreeParams) -> Self {
        Self { reversed: true, ..Self::with_params(params) }
    }

    fn oriented(&self, e: &ArcEvent) -> (VertexId, VertexId) {
        if self.reversed {
            (e.head, e.tail)
        } else {
            (e.tail, e.head)
        }
    }

    fn cleanup(&mut self) {
        self.data.clear();
        self.initialized = false;
    }

    fn initialize(&mut self, graph: &DiGraph) {
        if self.initialized {
            return;
        }
        self.root = self.source.or_else(|| graph.any_vertex());
        let Some(root) = self.root else {
            return;
        };
        trace!("initializing multi-level ES-tree from {root}");
        self.data.initialize(graph, root, self.reversed);
        self.initialized = true;
    }

    fn rerun(&mut self, graph: &DiGraph) {
        debug!("multi-level ES-tree: abandoning incremental restore, recomputing from scratch");
        self.counters.reruns += 1;
        self.initialized = false;
        self.initialize(graph);
    }

    fn process(&mut self, graph: &DiGraph, v: VertexId, scratch: &mut Scratch) -> Level {
        let record = self.data.get(v);
        if record.level == 0 || !record.is_reachable() {
            return 0;
        }

        let n = graph.size() as Level;
        let old_level = record.level;
        let mut level = old_level;
        let mut parent_index = record.parent_index;
        let num_slots = record.in_neighbors.len();
        let mut reach_v = true;
        let mut level_changed = false;
        let mut level_diff: Level = 0;
        let mut min_parent_level = UNREACHABLE;
        let mut min_parent_index = 0usize;

        if record.has_no_in_neighbors() {
            reach_v = false;
            level_changed = true;
            level_diff = n - old_level;
        } else {
            let data = &self.data;
            let parent_level_at = |index: usize| -> Option<Level> {
                data.get(v).in_neighbors.get(index).copied().flatten().map(|s| data.level(s.pred))
            };
            let old_index = parent_index;
            let mut parent = parent_level_at(parent_index);
            if let Some(pl) = parent {
                min_parent_level = pl;
            }
            min_parent_index = old_index;

            // keep scanning past a level change until the walk wraps back to
            // the old index, collecting the minimum-level slot on the way
            while reach_v && parent.is_none_or(|pl| level <= pl) && (!level_changed || parent_index < old_index) {
                parent_index += 1;
                if parent_index >= num_slots {
                    if level + 1 >= n {
                        reach_v = false;
                        level_changed = true;
                        level_diff = n - old_level;
                    } else {
                        level += 1;
                        level_diff += 1;
                        level_changed = true;
                        parent_index = 0;
                    }
                }
                if reach_v {
                    parent = parent_level_at(parent_index);
                    if let Some(pl) = parent {
                        if pl < min_parent_level || (pl == min_parent_level && parent_index < min_parent_index) {
                            min_parent_level = pl;
                            min_parent_index = parent_index;
                        }
                    }
                }
            }
        }

        {
            let record = self.data.get_mut(v);
            if reach_v {
                record.level = level;
                record.parent_index = parent_index;
            } else {
                record.set_unreachable();
            }
        }

        if level_changed {
            {
                let data = &self.data;
                let requeue_limit = self.params.requeue_limit;
                let max_requeued = &mut self.counters.max_requeued;
                let reversed = self.reversed;
                let mut update_children = |_a: ArcId, t: VertexId, h: VertexId| -> bool {
                    if scratch.limit_reached {
                        return true;
                    }
                    let child = if reversed { t } else { h };
                    let other = if reversed { h } else { t };
                    if child != other && data.is_parent(child, v) {
                        scratch.enqueue(child, requeue_limit, max_requeued);
                    }
                    false
                };
                if reversed {
                    graph.map_incoming_arcs_until(v, &mut update_children);
                } else {
                    graph.map_outgoing_arcs_until(v, &mut update_children);
                }
            }

            // settle directly on the minimum-level parent found by the scan
            if reach_v && !scratch.limit_reached {
                let record = self.data.get_mut(v);
                if min_parent_level == UNREACHABLE {
                    record.set_unreachable();
                    level_diff = n - old_level;
                } else {
                    record.level = min_parent_level + 1;
                    record.parent_index = min_parent_index;
                }
            }
        }

        level_diff
    }

    fn restore_tree(&mut self, graph: &DiGraph, seed: VertexId) {
        let affected_limit = self.params.affected_limit(graph.size());
        let mut scratch = Scratch {
            queue: BoundedFifo::with_capacity(affected_limit),
            times_in_queue: HashMap::new(),
            limit_reached: false,
        };
        scratch.queue.push_back(seed);
        scratch.limit_reached = scratch.queue.limit_reached();
        scratch.times_in_queue.insert(seed, 1);
        if self.counters.max_requeued == 0 {
            self.counters.max_requeued = 1;
        }

        let mut processed: u64 = 0;
        let mut needs_rerun = false;
        while let Some(v) = scratch.queue.pop_front() {
            let levels = self.process(graph, v, &mut scratch);
            processed += 1;

            let over_affected = processed as usize + scratch.queue.len() > affected_limit && !scratch.queue.is_empty();
            if scratch.limit_reached || over_affected {
                if scratch.limit_reached {
                    self.counters.rerun_requeued += 1;
                }
                if over_affected {
                    self.counters.rerun_num_affected += 1;
                }
                needs_rerun = true;
                break;
            } else if levels > 0 {
                self.counters.record_level_increase(levels);
            }
        }
        self.counters.record_affected(processed);
        if needs_rerun || scratch.limit_reached {
            self.rerun(graph);
        }
    }
}

impl DynamicDiGraphAlgorithm for MultiLevelEsTree {
    fn name(&self) -> String {
        format!(
            "Multi-Level ES-Tree {} Reachability Algorithm ({}/{})",
            if self.reversed { "Single-Sink" } else { "Single-Source" },
            self.params.requeue_limit,
            self.params.max_affected_ratio
        )
    }

    fn short_name(&self) -> String {
        format!("ML-EST{}({}/{})", if self.reversed { "-R" } else { "" }, self.params.requeue_limit, self.params.max_affected_ratio)
    }

    fn profile(&self) -> Vec<(&'static str, u64)> {
        self.counters.profile(&self.params)
    }

    fn auto_update(&self) -> bool {
        self.auto_update
    }

    fn set_auto_update(&mut self, auto_update: bool) {
        self.auto_update = auto_update;
    }

    fn on_graph_set(&mut self, _graph: &DiGraph) {
        self.cleanup();
        self.counters.reset();
    }

    fn on_graph_unset(&mut self) {
        self.cleanup();
    }

    fn on_vertex_add(&mut self, _graph: &DiGraph, v: VertexId) -> Result<()> {
        if self.initialized {
            self.data.ensure(v);
        }
        Ok(())
    }

    fn on_vertex_remove(&mut self, _graph: &DiGraph, v: VertexId) -> Result<()> {
        if self.initialized {
            self.data.remove(v);
        }
        Ok(())
    }

    fn on_arc_add(&mut self, graph: &DiGraph, e: ArcEvent) -> Result<()> {
        if !self.initialized || e.is_loop() {
            return Ok(());
        }
        let (tail, head) = self.oriented(&e);
        if Some(head) == self.root {
            return Ok(());
        }
        self.data.ensure(tail);
        self.data.ensure(head);
        if self.data.add_in_neighbor(head, tail, e.arc) {
            // a parallel copy of a known arc cannot improve anything
            return Ok(());
        }

        if !self.data.is_reachable(tail) {
            self.counters.inc_unreachable_tail += 1;
            return Ok(());
        }

        let n = graph.size() as Level;
        let old = self.data.level(head);
        let diff = self.data.reparent(head, tail, e.arc);
        if diff == 0 {
            self.counters.inc_non_tree += 1;
            return Ok(());
        }
        let decrease = if old == UNREACHABLE { n - self.data.level(head) } else { diff };
        self.counters.record_level_decrease(decrease);

        let reversed = self.reversed;
        let mut queue = VecDeque::from([head]);
        let mut enqueued = HashSet::from([head]);
        let data = &mut self.data;
        let counters = &mut self.counters;
        while let Some(x) = queue.pop_front() {
            let mut discovered = Vec::new();
            let mut relax = |a: ArcId, pt: VertexId, ph: VertexId| {
                let (t, h) = if reversed { (ph, pt) } else { (pt, ph) };
                if t == h {
                    return;
                }
                let old = data.level(h);
                let d = data.reparent(h, t, a);
                if d > 0 {
                    let decrease = if old == UNREACHABLE { n - data.level(h) } else { d };
                    counters.record_level_decrease(decrease);
                    if enqueued.insert(h) {
                        discovered.push(h);
                    }
                }
            };
            if reversed {
                graph.map_incoming_arcs(x, &mut relax);
            } else {
                graph.map_outgoing_arcs(x, &mut relax);
            }
            queue.extend(discovered);
        }
        Ok(())
    }

    fn on_arc_remove(&mut self, graph: &DiGraph, e: ArcEvent) -> Result<()> {
        if !self.initialized || e.is_loop() {
            return Ok(());
        }
        let (tail, head) = self.oriented(&e);
        if Some(head) == self.root {
            return Ok(());
        }
        if !self.data.contains(head) || !self.data.contains(tail) {
            return Err(ReachabilityError::InvariantViolation(format!(
                "removal of arc ({tail}, {head}) with an unregistered endpoint"
            )));
        }

        let was_parent = self.data.is_parent(head, tail);
        if self.data.remove_in_neighbor(head, e.arc) {
            // a parallel copy keeps the slot alive
            return Ok(());
        }

        if !self.data.is_reachable(head) {
            self.counters.dec_unreachable_head += 1;
            return Ok(());
        }
        if self.data.level(head) <= self.data.level(tail) || !was_parent {
            self.counters.dec_non_tree += 1;
            return Ok(());
        }
        self.restore_tree(graph, head);
        Ok(())
    }
}

impl DynamicSsReachAlgorithm for MultiLevelEsTree {
    fn set_source(&mut self, source: VertexId) {
        self.source = Some(source);
        self.cleanup();
    }

    fn source(&self) -> Option<VertexId> {
        self.source
    }

    fn run(&mut self, graph: &DiGraph) {
        self.initialize(graph);
    }

    fn query(&mut self, graph: &DiGraph, t: VertexId) -> bool {
        if Some(t) == self.source {
            return true;
        }
        if !self.initialized {
            self.initialize(graph);
        }
        self.data.is_reachable(t)
    }

    fn query_path(&mut self, graph: &DiGraph, t: VertexId) -> Vec<ArcId> {
        let mut path = Vec::new();
        if !self.query(graph, t) {
            return path;
        }
        let Some(root) = self.root else {
            return path;
        };
        let mut current = t;
        while current != root {
            let parent = self.data.parent(current).expect("reachable vertex must have a parent");
            let arc = if self.reversed { graph.find_arc(current, parent) } else { graph.find_arc(parent, current) }
                .expect("a counted slot implies a graph arc");
            path.push(arc);
            current = parent;
        }
        path.reverse();
        path
    }
}
