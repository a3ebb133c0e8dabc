//! Even–Shiloach tree scheduled through a level-ordered bucket queue.

use super::vertex_data::EsTreeData;
use super::{EsTreeCounters, EsTreeParams};
use crate::algorithm::{ArcEvent, DynamicDiGraphAlgorithm, DynamicSsReachAlgorithm};
use crate::errors::{ReachabilityError, Result};
use crate::queues::BucketQueue;
use crate::{Level, UNREACHABLE};
use dynreach_graph::{ArcId, DiGraph, VertexId};
use log::{debug, trace};
use std::collections::{HashMap, HashSet, VecDeque};

/// Scratch state of one restore pass.
#[derive(Default)]
struct Scratch {
    queue: BucketQueue,
    in_queue: HashSet<VertexId>,
    times_in_queue: HashMap<VertexId, u32>,
    limit_reached: bool,
}

impl Scratch {
    fn enqueue(&mut self, x: VertexId, level: Level, requeue_limit: u32, max_requeued: &mut u64) {
        let times = self.times_in_queue.entry(x).or_insert(0);
        *times += 1;
        if *times <= requeue_limit {
            *max_requeued = (*max_requeued).max(u64::from(*times));
            self.queue.push(x, level);
            self.in_queue.insert(x);
        } else {
            self.limit_reached = true;
        }
    }
}

/// Single-source reachability through an incrementally maintained BFS tree.
///
/// On arc deletion, affected vertices are reprocessed in level order through
/// a bucket queue; each processed vertex walks its in-neighbor table for a
/// parent one level up, sinking one level (and requeueing its subtree)
/// whenever the walk wraps around. A pass that requeues a single vertex more
/// than `requeue_limit` times, or touches more than
/// `max_affected_ratio * |V|` vertices, is abandoned for a full
/// recomputation.
pub struct BucketEsTree {
    data: EsTreeData,
    params: EsTreeParams,
    counters: EsTreeCounters,
    source: Option<VertexId>,
    root: Option<VertexId>,
    initialized: bool,
    auto_update: bool,
}

impl Default for BucketEsTree {
    fn default() -> Self {
        Self::new()
    }
}

impl BucketEsTree {
    pub fn new() -> Self {
        Self::with_params(EsTreeParams::default())
    }

    pub fn with_params(params: EsTreeParams) -> Self {
        Self {
            data: EsTreeData::default(),
            params,
            counters: EsTreeCounters::default(),
            source: None,
            root: None,
            initialized: false,
            auto_update: true,
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
        trace!("initializing bucket ES-tree from {root}");
        self.data.initialize(graph, root);
        self.initialized = true;
    }

    fn rerun(&mut self, graph: &DiGraph) {
        debug!("bucket ES-tree: abandoning incremental restore, recomputing from scratch");
        self.counters.reruns += 1;
        self.initialized = false;
        self.initialize(graph);
    }

    /// Finds a new parent for `v` or sinks it by one level, enqueueing its
    /// tree children (and `v` itself) whenever the level changed. Returns
    /// the level increase.
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

        if record.has_no_in_neighbors() {
            reach_v = false;
            level_changed = true;
            level_diff = n - old_level;
        } else {
            let data = &self.data;
            let parent_level_at = |index: usize| -> Option<Level> {
                data.get(v).in_neighbors.get(index).copied().flatten().map(|s| data.level(s.pred))
            };
            let mut parent = parent_level_at(parent_index);
            while reach_v && parent.is_none_or(|pl| level <= pl) && !level_changed {
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
                if reach_v && !level_changed {
                    parent = parent_level_at(parent_index);
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
            let data = &self.data;
            let requeue_limit = self.params.requeue_limit;
            let max_requeued = &mut self.counters.max_requeued;
            graph.map_outgoing_arcs_until(v, |a, t, h| {
                if scratch.limit_reached {
                    return true;
                }
                if t != h && data.is_tree_arc(h, a) && !scratch.in_queue.contains(&h) {
                    scratch.enqueue(h, data.level(h), requeue_limit, max_requeued);
                }
                false
            });
            if reach_v && !scratch.limit_reached {
                scratch.enqueue(v, level, requeue_limit, max_requeued);
            }
        }

        level_diff
    }

    fn restore_tree(&mut self, graph: &DiGraph, seed: VertexId) {
        let n = graph.size();
        let affected_limit = self.params.affected_limit(n);
        let mut scratch = Scratch::default();
        scratch.queue.set_limit(n);
        scratch.queue.push(seed, self.data.level(seed));
        scratch.in_queue.insert(seed);
        scratch.times_in_queue.insert(seed, 1);

        let mut processed: u64 = 0;
        let mut needs_rerun = false;
        while let Some(v) = scratch.queue.pop() {
            scratch.in_queue.remove(&v);
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
        if needs_rerun {
            self.rerun(graph);
        }
    }
}

impl DynamicDiGraphAlgorithm for BucketEsTree {
    fn name(&self) -> String {
        format!(
            "Bucket-Queue ES-Tree Single-Source Reachability Algorithm ({}/{})",
            self.params.requeue_limit, self.params.max_affected_ratio
        )
    }

    fn short_name(&self) -> String {
        format!("B-EST({}/{})", self.params.requeue_limit, self.params.max_affected_ratio)
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
        if !self.initialized || e.is_loop() || Some(e.head) == self.root {
            return Ok(());
        }
        let (tail, head) = (e.tail, e.head);
        self.data.ensure(tail);
        self.data.ensure(head);
        self.data.add_in_neighbor(head, tail, e.arc);

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

        // ripple the improvement forward; BFS order reaches every improvable
        // vertex at its lowest achievable level first
        let mut queue = VecDeque::from([head]);
        let mut enqueued = HashSet::from([head]);
        let data = &mut self.data;
        let counters = &mut self.counters;
        while let Some(x) = queue.pop_front() {
            let mut discovered = Vec::new();
            graph.map_outgoing_arcs(x, |a, t, h| {
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
            });
            queue.extend(discovered);
        }
        Ok(())
    }

    fn on_arc_remove(&mut self, graph: &DiGraph, e: ArcEvent) -> Result<()> {
        if !self.initialized || e.is_loop() || Some(e.head) == self.root {
            return Ok(());
        }
        let (tail, head) = (e.tail, e.head);
        if !self.data.contains(head) || !self.data.contains(tail) {
            return Err(ReachabilityError::InvariantViolation(format!(
                "removal of arc ({tail}, {head}) with an unregistered endpoint"
            )));
        }

        let was_tree_arc = self.data.is_tree_arc(head, e.arc);
        self.data.remove_in_neighbor(head, e.arc);

        if !self.data.is_reachable(head) {
            self.counters.dec_unreachable_head += 1;
            return Ok(());
        }
        if self.data.level(head) <= self.data.level(tail) || !was_tree_arc {
            self.counters.dec_non_tree += 1;
            return Ok(());
        }
        self.restore_tree(graph, head);
        Ok(())
    }
}

impl DynamicSsReachAlgorithm for BucketEsTree {
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
            let slot = self.data.get(current).parent_slot().expect("reachable vertex must have a tree arc");
            path.push(slot.arc);
            current = slot.pred;
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::{build_graph, check_against_bfs};

    #[test]
    fn test_lazy_initialization_on_query() {
        let (graph, vs, _) = build_graph(3, &[(0, 1), (1, 2)]);
        let mut tree = BucketEsTree::new();
        tree.on_graph_set(&graph);
        tree.set_source(vs[0]);
        // no explicit run: the first query initializes
        assert!(tree.query(&graph, vs[2]));
        check_against_bfs(&mut tree, &graph, vs[0]);
    }

    #[test]
    fn test_source_change_discards_the_tree() {
        let (graph, vs, _) = build_graph(3, &[(0, 1), (1, 2)]);
        let mut tree = BucketEsTree::new();
        tree.on_graph_set(&graph);
        tree.set_source(vs[0]);
        tree.run(&graph);
        assert!(tree.query(&graph, vs[2]));

        tree.set_source(vs[1]);
        assert!(!tree.query(&graph, vs[0]));
        assert!(tree.query(&graph, vs[2]));
        check_against_bfs(&mut tree, &graph, vs[1]);
    }

    #[test]
    fn test_restore_without_rerun_keeps_counters_quiet() {
        let (mut graph, vs, arcs) = build_graph(4, &[(0, 1), (0, 2), (1, 3), (2, 3)]);
        let mut tree = BucketEsTree::new();
        tree.on_graph_set(&graph);
        tree.set_source(vs[0]);
        tree.run(&graph);

        graph.remove_arc(arcs[2]);
        tree.on_arc_remove(&graph, ArcEvent { arc: arcs[2], tail: vs[1], head: vs[3] }).unwrap();
        assert!(tree.query(&graph, vs[3]));
        let reruns = tree.profile().iter().find(|(k, _)| *k == "reruns").unwrap().1;
        assert_eq!(reruns, 0);
    }
}
