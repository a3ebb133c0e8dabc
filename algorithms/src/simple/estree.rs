//! ES-style predecessor tree that rescans incoming arcs on demand.

use super::ses_data::SesTreeData;
use crate::algorithm::{ArcEvent, DynamicDiGraphAlgorithm, DynamicSsReachAlgorithm};
use crate::errors::{ReachabilityError, Result};
use crate::estree::{EsTreeCounters, EsTreeParams};
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

/// Single-source (or, with `reversed`, single-sink) reachability through a
/// predecessor tree.
///
/// The record keeps only the parent pointer and the tree arc; when a vertex
/// loses its parent, the maintainer rescans its actual incoming arcs for a
/// minimum-level substitute, stopping early once a parent exactly one level
/// up is found.
pub struct SimpleEsTree {
    data: SesTreeData,
    params: EsTreeParams,
    counters: EsTreeCounters,
    reversed: bool,
    source: Option<VertexId>,
    root: Option<VertexId>,
    initialized: bool,
    auto_update: bool,
}

impl Default for SimpleEsTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleEsTree {
    pub fn new() -> Self {
        Self::with_params(EsTreeParams::default())
    }

    pub fn with_params(params: EsTreeParams) -> Self {
        Self {
            data: SesTreeData::default(),
            params,
            counters: EsTreeCounters::default(),
            reversed: false,
            source: None,
            root: None,
            initialized: false,
            auto_update: true,
        }
    }

    /// Interprets every arc in reverse, computing single-sink reachability.
    pub fn reversed(params: EsTreeParams) -> Self {
        Self { reversed: true, ..Self::with_params(params) }
    }

    /// Depth of the current BFS tree (the maximum reachable level).
    pub fn bfs_tree_depth(&self) -> Level {
        self.data.max_level()
    }

    /// Number of vertices currently reached from the source.
    pub fn num_reachable(&self) -> usize {
        self.data.num_reachable()
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
        trace!("initializing simple ES-tree from {root}");
        self.data.initialize(graph, root, self.reversed);
        self.initialized = true;
    }

    fn rerun(&mut self, graph: &DiGraph) {
        debug!("simple ES-tree: abandoning incremental restore, recomputing from scratch");
        self.counters.reruns += 1;
        self.initialized = false;
        self.initialize(graph);
    }

    /// Rescans the incoming arcs of `v` for a new parent; sinks or drops the
    /// vertex if none qualifies, then requeues its tree children. Returns
    /// the level increase.
    fn process(&mut self, graph: &DiGraph, v: VertexId, scratch: &mut Scratch) -> Level {
        let record = self.data.get(v);
        if record.level == 0 || !record.is_reachable() {
            return 0;
        }
        if self.data.has_valid_parent(v) {
            return 0;
        }

        let old_parent = record.parent;
        let old_level = record.level;
        let mut parent = old_parent;
        let mut tree_arc = record.tree_arc;
        let mut min_parent_level = parent.map_or(UNREACHABLE, |p| self.data.level(p));

        {
            let data = &self.data;
            let reversed = self.reversed;
            let mut find_parent = |a: ArcId, pt: VertexId, ph: VertexId| -> bool {
                if min_parent_level != UNREACHABLE && min_parent_level + 1 == old_level {
                    return true;
                }
                if pt == ph {
                    return false;
                }
                let candidate = if reversed { ph } else { pt };
                let candidate_level = data.level(candidate);
                if candidate_level < min_parent_level {
                    min_parent_level = candidate_level;
                    parent = Some(candidate);
                    tree_arc = Some(a);
                }
                false
            };
            if reversed {
                graph.map_outgoing_arcs_until(v, &mut find_parent);
            } else {
                graph.map_incoming_arcs_until(v, &mut find_parent);
            }
        }

        let n = graph.size() as Level;
        let mut level_diff: Level = 0;
        if parent.is_none() || min_parent_level >= n - 1 {
            self.data.get_mut(v).set_unreachable();
            level_diff = n - old_level;
        } else if parent != old_parent || old_level <= min_parent_level {
            self.data.set_parent(v, parent.unwrap(), tree_arc.unwrap());
            level_diff = self.data.level(v) - old_level;
        }

        if level_diff > 0 {
            let data = &self.data;
            let requeue_limit = self.params.requeue_limit;
            let max_requeued = &mut self.counters.max_requeued;
            let reversed = self.reversed;
            let mut update_children = |a: ArcId, pt: VertexId, ph: VertexId| -> bool {
                if scratch.limit_reached {
                    return true;
                }
                let child = if reversed { pt } else { ph };
                if pt != ph && data.is_tree_arc(child, a) {
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

impl DynamicDiGraphAlgorithm for SimpleEsTree {
    fn name(&self) -> String {
        format!(
            "Simple ES-Tree {} Reachability Algorithm ({}/{})",
            if self.reversed { "Single-Sink" } else { "Single-Source" },
            self.params.requeue_limit,
            self.params.max_affected_ratio
        )
    }

    fn short_name(&self) -> String {
        format!("SES{}({}/{})", if self.reversed { "-R" } else { "" }, self.params.requeue_limit, self.params.max_affected_ratio)
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

        if !self.data.is_reachable(tail) {
            self.counters.inc_unreachable_tail += 1;
            return Ok(());
        }

        let n = graph.size() as Level;
        let tail_level = self.data.level(tail);
        let head_level = self.data.level(head);
        if head_level <= tail_level + 1 {
            self.counters.inc_non_tree += 1;
            return Ok(());
        }
        let decrease = if head_level == UNREACHABLE { n - (tail_level + 1) } else { head_level - (tail_level + 1) };
        self.counters.record_level_decrease(decrease);
        self.data.set_parent(head, tail, e.arc);

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
                let t_level = data.level(t);
                let h_level = data.level(h);
                if h_level == UNREACHABLE || t_level + 1 < h_level {
                    let decrease = if h_level == UNREACHABLE { n - (t_level + 1) } else { h_level - (t_level + 1) };
                    counters.record_level_decrease(decrease);
                    data.set_parent(h, t, a);
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
        if !self.data.contains(head) {
            return Err(ReachabilityError::InvariantViolation(format!(
                "removal of arc ({tail}, {head}) with an unregistered head"
            )));
        }

        if !self.data.is_reachable(head) {
            self.counters.dec_unreachable_head += 1;
            return Ok(());
        }

        if self.data.is_tree_arc(head, e.arc) {
            // clear the parent first; the restore pass must not see the
            // stale tree arc
            let record = self.data.get_mut(head);
            record.parent = None;
            record.tree_arc = None;
            self.restore_tree(graph, head);
        } else {
            self.counters.dec_non_tree += 1;
        }
        Ok(())
    }
}

impl DynamicSsReachAlgorithm for SimpleEsTree {
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
            let record = self.data.get(current);
            let arc = record.tree_arc.expect("reachable vertex must have a tree arc");
            path.push(arc);
            current = record.parent.expect("reachable vertex must have a parent");
        }
        path.reverse();
        path
    }
}
