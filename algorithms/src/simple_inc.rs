//! Incremental reachability with three-state tags and backward traceback.

use crate::algorithm::{ArcEvent, DynamicDiGraphAlgorithm, DynamicSsReachAlgorithm};
use crate::errors::Result;
use dynreach_graph::{ArcId, DiGraph, VertexId};
use log::{debug, trace};
use std::collections::{HashMap, HashSet, VecDeque};

/// Tuning knobs of [`SimpleIncSsReach`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleIncParams {
    /// Process the unknown vertices of a deletion in reverse discovery
    /// order.
    pub reverse_iteration: bool,
    /// After re-reaching an unknown vertex, immediately propagate
    /// reachability to its descendants.
    pub search_forward: bool,
    /// Unknown-state budget as a fraction of the reference count; `0.0`
    /// recomputes from scratch on every tree-arc deletion.
    pub max_unknown_ratio: f64,
    /// On an exceeded budget, wipe all state before re-reaching (instead of
    /// keeping the re-reached vertices and downgrading leftovers).
    pub radical_reset: bool,
    /// Use `⌊√reference⌋` as the unknown-state budget.
    pub max_unknown_sqrt: bool,
    /// Use `⌊log₂ reference⌋` as the unknown-state budget.
    pub max_unknown_log: bool,
    /// Relate the budget to the reachable-vertex count instead of `|V|`.
    pub relate_to_reachable: bool,
}

impl Default for SimpleIncParams {
    fn default() -> Self {
        Self {
            reverse_iteration: false,
            search_forward: true,
            max_unknown_ratio: 0.25,
            radical_reset: false,
            max_unknown_sqrt: false,
            max_unknown_log: false,
            relate_to_reachable: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Reachable,
    Unreachable,
    Unknown,
}

#[derive(Debug, Default, Clone)]
struct Counters {
    num_reached: u64,
    num_unknown: u64,
    num_unreached: u64,
    num_rereached: u64,
    num_tracebacks: u64,
    max_reached: u64,
    max_unknown: u64,
    max_unreached: u64,
    max_rereached: u64,
    max_tracebacks: u64,
    rereach_from_source: u64,
    dec_unreachable_head: u64,
    dec_non_tree: u64,
    inc_unreachable_tail: u64,
    inc_non_tree: u64,
}

/// Incremental single-source reachability for insertion-heavy workloads.
///
/// Insertions are handled by a plain forward reach. A deletion of a tree arc
/// first downgrades the affected subtree to *unknown*; if the subtree is
/// small enough, each unknown vertex searches backwards for a reachable
/// ancestor (traceback) and either re-enters the reachable region along the
/// reconstructed path or drags its fellow unknowns down to unreachable.
/// Oversized subtrees give up and recompute from the source.
pub struct SimpleIncSsReach {
    params: SimpleIncParams,
    counters: Counters,
    state: HashMap<VertexId, State>,
    pred: HashMap<VertexId, ArcId>,
    num_reachable: usize,
    source: Option<VertexId>,
    root: Option<VertexId>,
    initialized: bool,
    auto_update: bool,
}

impl Default for SimpleIncSsReach {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleIncSsReach {
    pub fn new() -> Self {
        Self::with_params(SimpleIncParams::default())
    }

    pub fn with_params(params: SimpleIncParams) -> Self {
        Self {
            params,
            counters: Counters::default(),
            state: HashMap::new(),
            pred: HashMap::new(),
            num_reachable: 0,
            source: None,
            root: None,
            initialized: false,
            auto_update: true,
        }
    }

    fn state_of(&self, v: VertexId) -> State {
        self.state.get(&v).copied().unwrap_or(State::Unreachable)
    }

    fn is_reachable(&self, v: VertexId) -> bool {
        self.state_of(v) == State::Reachable
    }

    /// Moves `v` into `s`, keeping the reachable count accurate. Returns
    /// whether the state actually changed.
    fn set_state(&mut self, v: VertexId, s: State) -> bool {
        let old = self.state_of(v);
        if old == s {
            return false;
        }
        if old == State::Reachable {
            self.num_reachable -= 1;
        }
        if s == State::Reachable {
            self.num_reachable += 1;
        }
        if s == State::Unreachable {
            self.state.remove(&v);
        } else {
            self.state.insert(v, s);
        }
        true
    }

    fn reset_all(&mut self) {
        self.state.clear();
        self.pred.clear();
        self.num_reachable = 0;
    }

    /// Forward reach from `from`: marks everything reachable through it,
    /// recording predecessor arcs. With `force`, already-reachable vertices
    /// are traversed again (used to rebuild after a soft reset).
    fn reach_from(&mut self, graph: &DiGraph, from: VertexId, force: bool) {
        self.set_state(from, State::Reachable);
        let mut reached: u64 = 1;
        let mut queue = VecDeque::from([from]);
        let mut visited = HashSet::from([from]);
        while let Some(x) = queue.pop_front() {
            let mut discovered = Vec::new();
            graph.map_outgoing_arcs(x, |a, t, h| {
                if t == h || Some(h) == self.root {
                    return;
                }
                if self.pred.get(&h).is_some_and(|&p| p != a) {
                    return;
                }
                if !force && self.state_of(h) == State::Reachable {
                    return;
                }
                if visited.contains(&h) {
                    return;
                }
                discovered.push((a, h));
            });
            for (a, h) in discovered {
                if !visited.insert(h) {
                    continue;
                }
                self.pred.insert(h, a);
                if self.set_state(h, State::Reachable) {
                    reached += 1;
                }
                queue.push_back(h);
            }
        }
        self.counters.num_reached += reached;
        self.counters.max_reached = self.counters.max_reached.max(reached);
    }

    /// Downgrades the tree descendants of `from` to unknown, clearing their
    /// predecessor arcs, and returns them in discovery order. With a step
    /// budget, the walk stops early once the budget is exhausted (the caller
    /// is going to wipe everything anyway).
    fn propagate_unknown(&mut self, graph: &DiGraph, from: VertexId, max_steps: Option<usize>) -> Vec<VertexId> {
        let mut changed = Vec::new();
        self.pred.remove(&from);
        if self.set_state(from, State::Unknown) {
            changed.push(from);
        }
        let mut steps = 1usize;
        let mut queue = VecDeque::from([from]);
        while let Some(x) = queue.pop_front() {
            if max_steps.is_some_and(|m| steps > m) {
                break;
            }
            let mut discovered = Vec::new();
            graph.map_outgoing_arcs(x, |a, t, h| {
                if t == h || Some(h) == self.root {
                    return;
                }
                // only tree arcs carry the downgrade
                if self.pred.get(&h) != Some(&a) {
                    return;
                }
                if self.state_of(h) != State::Reachable {
                    return;
                }
                discovered.push((a, h));
            });
            for (_, h) in discovered {
                self.pred.remove(&h);
                if self.set_state(h, State::Unknown) {
                    changed.push(h);
                    steps += 1;
                }
                queue.push_back(h);
            }
        }
        changed
    }

    /// Backward search from the unknown vertex `u` for a reachable
    /// ancestor. On success the ancestor-to-`u` path is replayed forward,
    /// re-reaching every vertex on it; `visited_unknown` collects the
    /// unknown vertices seen either way.
    fn check_reachability(&mut self, graph: &DiGraph, u: VertexId, visited_unknown: &mut Vec<VertexId>) -> bool {
        debug_assert_eq!(self.state_of(u), State::Unknown);
        visited_unknown.push(u);

        let mut succ: HashMap<VertexId, ArcId> = HashMap::new();
        let mut ancestor = None;
        let mut queue = VecDeque::from([u]);
        let mut visited = HashSet::from([u]);
        'outer: while let Some(x) = queue.pop_front() {
            let mut discovered = Vec::new();
            graph.map_incoming_arcs(x, |a, t, h| {
                if t == h || visited.contains(&t) {
                    return;
                }
                discovered.push((a, t));
            });
            for (a, t) in discovered {
                if !visited.insert(t) {
                    continue;
                }
                match self.state_of(t) {
                    State::Reachable => {
                        succ.insert(t, a);
                        ancestor = Some(t);
                        break 'outer;
                    }
                    State::Unknown => {
                        visited_unknown.push(t);
                        succ.insert(t, a);
                        queue.push_back(t);
                    }
                    State::Unreachable => {}
                }
            }
        }

        let Some(mut t) = ancestor else {
            return false;
        };
        trace!("traceback from {u} found reachable ancestor {t}");
        while t != u {
            let a = succ[&t];
            let h = graph.head(a);
            self.pred.insert(h, a);
            self.set_state(h, State::Reachable);
            t = h;
        }
        true
    }

    /// Handles the deletion of the tree arc into `from`.
    fn unreach_from(&mut self, graph: &DiGraph, from: VertexId) {
        if Some(from) == self.root {
            return;
        }
        let root = self.root.expect("initialized algorithm has a root");
        let p = self.params;

        if !p.max_unknown_sqrt && !p.max_unknown_log && p.max_unknown_ratio == 0.0 {
            debug!("unknown-state budget is zero, recomputing from {root}");
            self.counters.rereach_from_source += 1;
            self.reset_all();
            self.reach_from(graph, root, false);
            return;
        }

        let relate_to = if p.relate_to_reachable { self.num_reachable } else { graph.size() };
        let budget = if p.max_unknown_sqrt {
            (relate_to as f64).sqrt().floor() as usize
        } else if p.max_unknown_log {
            (relate_to.max(1) as f64).log2().floor() as usize
        } else {
            (p.max_unknown_ratio * relate_to as f64).floor() as usize
        };

        let changed = self.propagate_unknown(graph, from, if p.radical_reset { Some(budget) } else { None });
        let unknown = changed.len() as u64;
        self.counters.num_unknown += unknown;
        self.counters.max_unknown = self.counters.max_unknown.max(unknown);

        if changed.len() > budget {
            debug!("{} unknown vertices exceed the budget of {budget}, recomputing", changed.len());
            self.counters.rereach_from_source += 1;
            if p.radical_reset {
                self.reset_all();
                self.reach_from(graph, root, false);
            } else {
                self.reach_from(graph, root, true);
                for v in changed {
                    if self.state_of(v) != State::Reachable {
                        self.set_state(v, State::Unreachable);
                    }
                }
            }
            return;
        }

        let mut rereached: u64 = 0;
        let mut tracebacks: u64 = 0;
        let mut backwards_reached = Vec::new();
        let mut process_unknown = |this: &mut Self, u: VertexId| {
            if this.state_of(u) == State::Unknown {
                tracebacks += 1;
                backwards_reached.clear();
                if this.check_reachability(graph, u, &mut backwards_reached) {
                    if p.search_forward {
                        this.reach_from(graph, u, false);
                    }
                    debug_assert_eq!(this.state_of(u), State::Reachable);
                } else {
                    for &v in &backwards_reached {
                        this.set_state(v, State::Unreachable);
                    }
                    debug_assert_eq!(this.state_of(u), State::Unreachable);
                }
            }
            if this.state_of(u) == State::Reachable {
                rereached += 1;
            }
        };
        if p.reverse_iteration {
            for &u in changed.iter().rev() {
                process_unknown(self, u);
            }
        } else {
            for &u in changed.iter() {
                process_unknown(self, u);
            }
        }

        let unreached = unknown - rereached;
        self.counters.num_unreached += unreached;
        self.counters.num_rereached += rereached;
        self.counters.num_tracebacks += tracebacks;
        self.counters.max_unreached = self.counters.max_unreached.max(unreached);
        self.counters.max_rereached = self.counters.max_rereached.max(rereached);
        self.counters.max_tracebacks = self.counters.max_tracebacks.max(tracebacks);
    }

    fn initialize(&mut self, graph: &DiGraph) {
        if self.initialized {
            return;
        }
        self.root = self.source.or_else(|| graph.any_vertex());
        let Some(root) = self.root else {
            return;
        };
        self.reset_all();
        self.reach_from(graph, root, false);
        self.initialized = true;
    }
}

impl DynamicDiGraphAlgorithm for SimpleIncSsReach {
    fn name(&self) -> String {
        let p = &self.params;
        let budget = if p.max_unknown_sqrt {
            "SQRT".to_string()
        } else if p.max_unknown_log {
            "LOG".to_string()
        } else {
            format!("{}", p.max_unknown_ratio)
        };
        format!(
            "Simple Incremental Single-Source Reachability Algorithm ({}/{}/{budget}*{}/{})",
            if p.reverse_iteration { "reverse" } else { "non-reverse" },
            if p.search_forward { "forward search" } else { "no forward search" },
            if p.relate_to_reachable { "#R" } else { "#V" },
            if p.radical_reset { "radical reset" } else { "soft reset" },
        )
    }

    fn short_name(&self) -> String {
        let p = &self.params;
        let budget = if p.max_unknown_sqrt {
            "SQRT".to_string()
        } else if p.max_unknown_log {
            "LOG".to_string()
        } else {
            format!("{}", p.max_unknown_ratio)
        };
        format!(
            "Simple-ISSR({}/{}/{budget}~{}/{})",
            if p.reverse_iteration { "R" } else { "NR" },
            if p.search_forward { "SF" } else { "NSF" },
            if p.relate_to_reachable { "R" } else { "G" },
            if p.radical_reset { "C" } else { "NC" },
        )
    }

    fn profile(&self) -> Vec<(&'static str, u64)> {
        let c = &self.counters;
        vec![
            ("total_reached", c.num_reached),
            ("total_unknown", c.num_unknown),
            ("total_unreached", c.num_unreached),
            ("total_rereached", c.num_rereached),
            ("total_tracebacks", c.num_tracebacks),
            ("max_reached", c.max_reached),
            ("max_unknown", c.max_unknown),
            ("max_unreached", c.max_unreached),
            ("max_rereached", c.max_rereached),
            ("max_tracebacks", c.max_tracebacks),
            ("unknown_limit_percent", (self.params.max_unknown_ratio * 100.0) as u64),
            ("rereach_from_source", c.rereach_from_source),
            ("dec_head_unreachable", c.dec_unreachable_head),
            ("dec_nontree", c.dec_non_tree),
            ("inc_tail_unreachable", c.inc_unreachable_tail),
            ("inc_nontree", c.inc_non_tree),
        ]
    }

    fn auto_update(&self) -> bool {
        self.auto_update
    }

    fn set_auto_update(&mut self, auto_update: bool) {
        self.auto_update = auto_update;
    }

    fn on_graph_set(&mut self, _graph: &DiGraph) {
        self.reset_all();
        self.counters = Counters::default();
        self.initialized = false;
    }

    fn on_graph_unset(&mut self) {
        self.reset_all();
        self.initialized = false;
    }

    fn on_vertex_remove(&mut self, _graph: &DiGraph, v: VertexId) -> Result<()> {
        if self.initialized {
            debug_assert!(!self.is_reachable(v), "a vertex is removed only after its arcs");
            self.state.remove(&v);
            self.pred.remove(&v);
        }
        Ok(())
    }

    fn on_arc_add(&mut self, graph: &DiGraph, e: ArcEvent) -> Result<()> {
        if !self.initialized || e.is_loop() || Some(e.head) == self.root {
            return Ok(());
        }
        if !self.is_reachable(e.tail) {
            self.counters.inc_unreachable_tail += 1;
            return Ok(());
        }
        if self.is_reachable(e.head) {
            self.counters.inc_non_tree += 1;
            return Ok(());
        }
        self.pred.insert(e.head, e.arc);
        self.reach_from(graph, e.head, false);
        Ok(())
    }

    fn on_arc_remove(&mut self, graph: &DiGraph, e: ArcEvent) -> Result<()> {
        if !self.initialized || e.is_loop() || Some(e.head) == self.root {
            return Ok(());
        }
        if !self.is_reachable(e.head) {
            self.counters.dec_unreachable_head += 1;
            return Ok(());
        }
        if self.pred.get(&e.head) != Some(&e.arc) {
            self.counters.dec_non_tree += 1;
            return Ok(());
        }
        self.pred.remove(&e.head);
        self.unreach_from(graph, e.head);
        Ok(())
    }
}

impl DynamicSsReachAlgorithm for SimpleIncSsReach {
    fn set_source(&mut self, source: VertexId) {
        self.source = Some(source);
        self.initialized = false;
        self.reset_all();
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
        self.is_reachable(t)
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
            let a = self.pred[&current];
            path.push(a);
            current = graph.tail(a);
        }
        path.reverse();
        path
    }
}
