use crate::digraph::DiGraph;
use crate::errors::{GraphError, GraphResult};
use crate::operations::{ArcOpId, Operation, OperationKind};
use crate::types::{ArcId, Timestamp, VertexId, VertexIdentifier, Weight};
use log::{debug, trace};
use std::collections::{HashMap, VecDeque};

/// An atomic change applied to the current graph during replay. Arc events
/// carry the endpoints so that observers of a removal never have to look up
/// a handle that is already gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphUpdate {
    VertexAdded(VertexId),
    VertexRemoved(VertexId),
    ArcAdded { arc: ArcId, tail: VertexId, head: VertexId },
    ArcRemoved { arc: ArcId, tail: VertexId, head: VertexId },
    ArcWeightChanged { arc: ArcId, weight: Weight },
}

/// A directed graph evolving through an append-only, timestamped operation
/// log.
///
/// The host keeps two views: the *construction graph*, which always reflects
/// the whole log and is used to validate recording calls, and the *current
/// graph*, obtained by replaying a prefix of the log. Recording and replay
/// are independent: operations may be appended while the replay cursor sits
/// anywhere, and [`reset_to_big_bang`](Self::reset_to_big_bang) rewinds the
/// current graph without touching the log.
///
/// Timestamps are non-decreasing. The contiguous run of operations sharing a
/// timestamp forms a *delta*; [`apply_next_delta`](Self::apply_next_delta)
/// replays one delta at a time.
#[derive(Default)]
pub struct DynamicDiGraph {
    construction: DiGraph,
    current: DiGraph,

    operations: Vec<Operation>,
    timestamps: Vec<Timestamp>,
    /// Index of the first operation of each timestamp.
    offsets: Vec<usize>,
    /// Vertex additions pulled in front of the whole log by antedated arc
    /// additions.
    antedated: Vec<Operation>,

    time_index: usize,
    op_index: usize,

    second_arc_is_removal: bool,
    remove_isolated_ends: bool,
    default_arc_lifetime: usize,
    /// Ring of scheduled automatic arc removals; bucket 0 is drained at the
    /// start of the next delta.
    auto_removals: VecDeque<Vec<ArcOpId>>,

    next_arc_op: ArcOpId,
    next_auto_id: VertexIdentifier,

    // Construction-side lookup state.
    construction_vertices: HashMap<VertexIdentifier, VertexId>,
    construction_arc_ops: HashMap<ArcId, ArcOpId>,
    arc_op_construction: HashMap<ArcOpId, (ArcId, VertexIdentifier, VertexIdentifier)>,

    // Replay-side lookup state.
    replay_vertices: HashMap<VertexIdentifier, VertexId>,
    replay_arcs: HashMap<ArcOpId, ArcId>,
    replay_weights: HashMap<ArcId, Weight>,
}

impl DynamicDiGraph {
    pub fn new() -> Self {
        Self { default_arc_lifetime: 1, ..Default::default() }
    }

    /// When enabled, an `add_arc(u, v)` for an arc that already exists is
    /// recorded as `remove_arc(u, v)` instead.
    pub fn set_second_arc_is_removal(&mut self, enabled: bool) {
        self.second_arc_is_removal = enabled;
    }

    /// When enabled, removing an arc also removes endpoints that become
    /// isolated.
    pub fn set_remove_isolated_ends(&mut self, enabled: bool) {
        self.remove_isolated_ends = enabled;
    }

    /// Lifetime, in deltas, used by [`add_arc_for`](Self::add_arc_for) when
    /// the caller passes `0`.
    pub fn set_default_arc_lifetime(&mut self, lifetime: usize) {
        if lifetime > 0 {
            self.default_arc_lifetime = lifetime;
        }
    }

    pub fn default_arc_lifetime(&self) -> usize {
        self.default_arc_lifetime
    }

    // ---------------------------------------------------------------------
    // Recording
    // ---------------------------------------------------------------------

    fn check_timestamp(&mut self, timestamp: Timestamp) -> GraphResult<()> {
        if let Some(&last) = self.timestamps.last() {
            if timestamp < last {
                return Err(GraphError::InvalidTimestamp(timestamp, last));
            }
        }
        self.extend_time(timestamp);
        Ok(())
    }

    fn extend_time(&mut self, timestamp: Timestamp) {
        if self.timestamps.last().is_none_or(|&last| last < timestamp) {
            self.timestamps.push(timestamp);
            self.offsets.push(self.operations.len());

            // A new delta begins: due arc removals run before anything else
            // recorded at this timestamp.
            if let Some(due) = self.auto_removals.pop_front() {
                for op in due {
                    if self.arc_op_construction.contains_key(&op) {
                        debug!("auto-removing arc op {op} at time {timestamp}");
                        self.record_arc_removal(op, self.remove_isolated_ends);
                    }
                }
                self.auto_removals.push_back(Vec::new());
            }
        }
    }

    /// Appends a vertex addition with a fresh identifier.
    pub fn add_vertex(&mut self, timestamp: Timestamp) -> GraphResult<VertexIdentifier> {
        let id = self.next_auto_id;
        self.add_vertex_with_id(id, timestamp, false)?;
        Ok(id)
    }

    /// Appends a vertex addition with a caller-chosen identifier. If the id
    /// is already present, fails with `DuplicateVertex` unless
    /// `ok_if_exists`, in which case nothing is recorded.
    pub fn add_vertex_with_id(&mut self, id: VertexIdentifier, timestamp: Timestamp, ok_if_exists: bool) -> GraphResult<()> {
        if self.construction_vertices.contains_key(&id) {
            if ok_if_exists {
                return Ok(());
            }
            return Err(GraphError::DuplicateVertex(id));
        }
        self.check_timestamp(timestamp)?;
        self.create_construction_vertex(id);
        self.operations.push(Operation::AddVertex { id });
        Ok(())
    }

    fn create_construction_vertex(&mut self, id: VertexIdentifier) {
        let cv = self.construction.add_vertex();
        self.construction_vertices.insert(id, cv);
        self.next_auto_id = self.next_auto_id.max(id + 1);
    }

    /// Appends a vertex removal preceded by removals of all incident arcs.
    pub fn remove_vertex(&mut self, id: VertexIdentifier, timestamp: Timestamp) -> GraphResult<()> {
        let cv = *self.construction_vertices.get(&id).ok_or(GraphError::UnknownVertex(id))?;
        self.check_timestamp(timestamp)?;

        let mut incident = Vec::new();
        self.construction.map_outgoing_arcs(cv, |a, _, _| incident.push(a));
        self.construction.map_incoming_arcs(cv, |a, _, _| {
            if !incident.contains(&a) {
                incident.push(a)
            }
        });

        let mut ops = Vec::with_capacity(incident.len() + 1);
        for ca in incident {
            let op = self.construction_arc_ops.remove(&ca).expect("every construction arc has a recorded addition");
            let (_, tail, head) = self.arc_op_construction.remove(&op).unwrap();
            self.construction.remove_arc(ca);
            ops.push(Operation::RemoveArc { op, tail, head });
        }
        self.construction.remove_vertex(cv);
        self.construction_vertices.remove(&id);
        ops.push(Operation::RemoveVertex { id });

        if ops.len() == 1 {
            self.operations.push(ops.pop().unwrap());
        } else {
            self.operations.push(Operation::Multiple(ops));
        }
        Ok(())
    }

    /// Appends an arc addition. Endpoints that do not exist yet are created
    /// along the way: as an antedated prelude applied before the whole log
    /// when `antedate` is set and no operation has been replayed yet,
    /// otherwise bundled with the arc addition at this timestamp.
    ///
    /// In second-arc-is-removal mode an addition of an existing arc turns
    /// into its removal.
    pub fn add_arc(&mut self, tail: VertexIdentifier, head: VertexIdentifier, timestamp: Timestamp, antedate: bool) -> GraphResult<()> {
        if self.second_arc_is_removal && self.find_construction_arc(tail, head).is_some() {
            return self.remove_arc(tail, head, timestamp);
        }
        self.record_arc_addition(tail, head, timestamp, antedate)?;
        Ok(())
    }

    /// Appends an arc addition and schedules its removal `lifetime` deltas
    /// later (the configured default lifetime if `lifetime` is `0`). The
    /// scheduled removal is recorded ahead of any other operation of the
    /// delta it falls into.
    pub fn add_arc_for(
        &mut self,
        tail: VertexIdentifier,
        head: VertexIdentifier,
        timestamp: Timestamp,
        lifetime: usize,
        antedate: bool,
    ) -> GraphResult<()> {
        let lifetime = if lifetime == 0 { self.default_arc_lifetime.max(1) } else { lifetime };
        let op = self.record_arc_addition(tail, head, timestamp, antedate)?;
        while self.auto_removals.len() < lifetime {
            self.auto_removals.push_back(Vec::new());
        }
        self.auto_removals[lifetime - 1].push(op);
        Ok(())
    }

    pub(crate) fn record_arc_addition(
        &mut self,
        tail: VertexIdentifier,
        head: VertexIdentifier,
        timestamp: Timestamp,
        antedate: bool,
    ) -> GraphResult<ArcOpId> {
        self.check_timestamp(timestamp)?;

        let mut implied = Vec::new();
        for id in [tail, head] {
            if !self.construction_vertices.contains_key(&id) {
                self.create_construction_vertex(id);
                implied.push(Operation::AddVertex { id });
            }
        }

        let op = self.next_arc_op;
        self.next_arc_op += 1;
        let ct = self.construction_vertices[&tail];
        let ch = self.construction_vertices[&head];
        let ca = self.construction.add_arc(ct, ch);
        self.construction_arc_ops.insert(ca, op);
        self.arc_op_construction.insert(op, (ca, tail, head));

        let add = Operation::AddArc { op, tail, head };
        if implied.is_empty() {
            self.operations.push(add);
        } else if antedate && self.op_index == 0 {
            self.antedated.append(&mut implied);
            self.operations.push(add);
        } else {
            implied.push(add);
            self.operations.push(Operation::Multiple(implied));
        }
        Ok(op)
    }

    /// Appends the removal of some arc `tail -> head`; fails with
    /// `UnknownArc` if the construction graph has none.
    pub fn remove_arc(&mut self, tail: VertexIdentifier, head: VertexIdentifier, timestamp: Timestamp) -> GraphResult<()> {
        let op = self.find_construction_arc(tail, head).ok_or(GraphError::UnknownArc(tail, head))?;
        self.check_timestamp(timestamp)?;
        self.record_arc_removal(op, self.remove_isolated_ends);
        Ok(())
    }

    pub(crate) fn find_construction_arc(&self, tail: VertexIdentifier, head: VertexIdentifier) -> Option<ArcOpId> {
        let ct = *self.construction_vertices.get(&tail)?;
        let ch = *self.construction_vertices.get(&head)?;
        let ca = self.construction.find_arc(ct, ch)?;
        Some(self.construction_arc_ops[&ca])
    }

    fn record_arc_removal(&mut self, op: ArcOpId, remove_isolated_ends: bool) {
        let (ca, tail, head) = self.arc_op_construction.remove(&op).expect("arc op must still be alive");
        self.construction_arc_ops.remove(&ca);
        let (ct, ch) = self.construction.arc_ends(ca).unwrap();
        self.construction.remove_arc(ca);

        let remove = Operation::RemoveArc { op, tail, head };
        if !remove_isolated_ends {
            self.operations.push(remove);
            return;
        }

        let mut ops = vec![remove];
        for (cv, id) in [(ct, tail), (ch, head)] {
            if self.construction.contains_vertex(cv) && self.construction.is_isolated(cv) {
                self.construction.remove_vertex(cv);
                self.construction_vertices.remove(&id);
                ops.push(Operation::RemoveVertex { id });
            }
        }
        if ops.len() == 1 {
            self.operations.push(ops.pop().unwrap());
        } else {
            self.operations.push(Operation::Multiple(ops));
        }
    }

    /// Appends a no-op, preserving `timestamp` in the timeline.
    pub fn noop(&mut self, timestamp: Timestamp) -> GraphResult<()> {
        self.check_timestamp(timestamp)?;
        self.operations.push(Operation::NoOp);
        Ok(())
    }

    pub(crate) fn record_weight_change(&mut self, op: ArcOpId, weight: Weight, timestamp: Timestamp) -> GraphResult<()> {
        self.check_timestamp(timestamp)?;
        self.operations.push(Operation::ChangeArcWeight { op, weight });
        Ok(())
    }

    /// Merges the last `num` appended operations into a single composite
    /// record. Fails with `InvalidArgument` if `num` reaches across the
    /// start of the latest delta or into operations already replayed.
    pub fn compact(&mut self, num: usize) -> GraphResult<()> {
        let tail_start = self.offsets.last().copied().unwrap_or(0);
        if num > self.operations.len() - tail_start {
            return Err(GraphError::InvalidArgument(format!(
                "cannot compact {num} operations: the current delta only has {}",
                self.operations.len() - tail_start
            )));
        }
        if self.op_index > self.operations.len() - num {
            return Err(GraphError::InvalidArgument("cannot compact operations that were already replayed".into()));
        }
        let mut merged = Vec::with_capacity(num);
        for _ in 0..num {
            match self.operations.pop().unwrap() {
                Operation::Multiple(mut inner) => {
                    while let Some(op) = inner.pop() {
                        merged.push(op);
                    }
                }
                op => merged.push(op),
            }
        }
        merged.reverse();
        self.operations.push(Operation::Multiple(merged));
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Replay
    // ---------------------------------------------------------------------

    /// The graph as replayed so far.
    pub fn current_graph(&self) -> &DiGraph {
        &self.current
    }

    /// Rewinds the current graph to the state before any operation.
    pub fn reset_to_big_bang(&mut self) {
        self.current.clear();
        self.replay_vertices.clear();
        self.replay_arcs.clear();
        self.replay_weights.clear();
        self.time_index = 0;
        self.op_index = 0;
    }

    fn advance(&mut self, same_timestamp: bool, observer: &mut impl FnMut(&DiGraph, GraphUpdate)) -> bool {
        if self.op_index >= self.operations.len() {
            return false;
        }
        if self.time_index + 1 < self.timestamps.len() && self.op_index == self.offsets[self.time_index + 1] {
            if same_timestamp {
                return false;
            }
            self.time_index += 1;
        }
        if self.op_index == 0 {
            let prelude = std::mem::take(&mut self.antedated);
            for op in &prelude {
                self.apply(op, observer);
            }
            self.antedated = prelude;
        }
        true
    }

    /// Replays a single operation. With `same_timestamp`, refuses to cross a
    /// timestamp boundary. Returns whether an operation was applied.
    pub fn apply_next_op(&mut self, same_timestamp: bool) -> bool {
        self.apply_next_op_observed(same_timestamp, |_, _| {})
    }

    /// Like [`apply_next_op`](Self::apply_next_op), reporting every atomic
    /// change to `observer` right after it took effect.
    pub fn apply_next_op_observed(&mut self, same_timestamp: bool, mut observer: impl FnMut(&DiGraph, GraphUpdate)) -> bool {
        if !self.advance(same_timestamp, &mut observer) {
            return false;
        }
        let op = self.operations[self.op_index].clone();
        self.apply(&op, &mut observer);
        self.op_index += 1;
        true
    }

    /// Replays operations up to the next timestamp boundary (or the end of
    /// the log). Returns whether anything was applied.
    pub fn apply_next_delta(&mut self) -> bool {
        self.apply_next_delta_observed(|_, _| {})
    }

    pub fn apply_next_delta_observed(&mut self, mut observer: impl FnMut(&DiGraph, GraphUpdate)) -> bool {
        if !self.advance(false, &mut observer) {
            return false;
        }
        let max_op =
            if self.time_index + 1 < self.offsets.len() { self.offsets[self.time_index + 1] } else { self.operations.len() };
        trace!("applying delta #{} (ops {}..{})", self.time_index, self.op_index, max_op);
        while self.op_index < max_op {
            let op = self.operations[self.op_index].clone();
            self.apply(&op, &mut observer);
            self.op_index += 1;
        }
        true
    }

    fn apply(&mut self, op: &Operation, observer: &mut impl FnMut(&DiGraph, GraphUpdate)) {
        match op {
            Operation::AddVertex { id } => {
                let v = self.current.add_vertex();
                self.replay_vertices.insert(*id, v);
                observer(&self.current, GraphUpdate::VertexAdded(v));
            }
            Operation::RemoveVertex { id } => {
                let v = self.replay_vertices.remove(id).expect("removal of an unknown vertex survived recording");
                self.current.remove_vertex(v);
                observer(&self.current, GraphUpdate::VertexRemoved(v));
            }
            Operation::AddArc { op, tail, head } => {
                let t = self.replay_vertices[tail];
                let h = self.replay_vertices[head];
                let arc = self.current.add_arc(t, h);
                self.replay_arcs.insert(*op, arc);
                observer(&self.current, GraphUpdate::ArcAdded { arc, tail: t, head: h });
            }
            Operation::RemoveArc { op, .. } => {
                let arc = self.replay_arcs.remove(op).expect("removal of an unknown arc survived recording");
                let (t, h) = self.current.arc_ends(arc).unwrap();
                self.current.remove_arc(arc);
                self.replay_weights.remove(&arc);
                observer(&self.current, GraphUpdate::ArcRemoved { arc, tail: t, head: h });
            }
            Operation::ChangeArcWeight { op, weight } => {
                let arc = self.replay_arcs[op];
                self.replay_weights.insert(arc, *weight);
                observer(&self.current, GraphUpdate::ArcWeightChanged { arc, weight: *weight });
            }
            Operation::NoOp => {}
            Operation::Multiple(ops) => {
                for op in ops {
                    self.apply(op, observer);
                }
            }
        }
    }

    // ---------------------------------------------------------------------
    // Interrogation
    // ---------------------------------------------------------------------

    /// Timestamp of the delta the replay cursor is in.
    pub fn current_time(&self) -> Timestamp {
        self.timestamps.get(self.time_index).copied().unwrap_or(0)
    }

    pub fn max_time(&self) -> Timestamp {
        self.timestamps.last().copied().unwrap_or(0)
    }

    pub fn timestamps(&self) -> &[Timestamp] {
        &self.timestamps
    }

    pub fn num_deltas(&self) -> usize {
        self.timestamps.len()
    }

    pub fn num_operations(&self) -> usize {
        self.operations.len()
    }

    pub fn size_of_last_delta(&self) -> usize {
        if self.offsets.is_empty() {
            return 0;
        }
        if self.time_index + 1 < self.offsets.len() {
            self.offsets[self.time_index + 1] - self.offsets[self.time_index]
        } else {
            self.operations.len() - self.offsets[self.time_index]
        }
    }

    pub fn size_of_final_delta(&self) -> usize {
        self.offsets.last().map_or(0, |&o| self.operations.len() - o)
    }

    /// Whether the construction graph contains some arc `tail -> head`.
    pub fn has_arc(&self, tail: VertexIdentifier, head: VertexIdentifier) -> bool {
        self.find_construction_arc(tail, head).is_some()
    }

    /// The current-graph handle of `id`, if the vertex exists at the replay
    /// cursor.
    pub fn vertex_for_id(&self, id: VertexIdentifier) -> Option<VertexId> {
        self.replay_vertices.get(&id).copied()
    }

    /// The weight last assigned to `arc` at the replay cursor, if any.
    pub fn current_arc_weight(&self, arc: ArcId) -> Option<Weight> {
        self.replay_weights.get(&arc).copied()
    }

    pub fn constructed_graph_size(&self) -> usize {
        self.construction.size()
    }

    pub fn constructed_arc_size(&self) -> usize {
        self.construction.num_arcs()
    }

    fn count_operations(&self, from: Timestamp, until: Timestamp, kind: OperationKind) -> usize {
        if until < from || self.timestamps.is_empty() || from > self.max_time() {
            return 0;
        }
        let start_delta = self.timestamps.partition_point(|&t| t < from);
        let end_delta = self.timestamps.partition_point(|&t| t <= until);
        if start_delta >= end_delta {
            return 0;
        }
        let start = self.offsets[start_delta];
        let end = if end_delta < self.offsets.len() { self.offsets[end_delta] } else { self.operations.len() };
        self.operations[start..end].iter().map(|op| op.count(kind)).sum()
    }

    pub fn count_vertex_additions(&self, from: Timestamp, until: Timestamp) -> usize {
        self.count_operations(from, until, OperationKind::VertexAddition)
    }

    pub fn count_vertex_removals(&self, from: Timestamp, until: Timestamp) -> usize {
        self.count_operations(from, until, OperationKind::VertexRemoval)
    }

    pub fn count_arc_additions(&self, from: Timestamp, until: Timestamp) -> usize {
        self.count_operations(from, until, OperationKind::ArcAddition)
    }

    pub fn count_arc_removals(&self, from: Timestamp, until: Timestamp) -> usize {
        self.count_operations(from, until, OperationKind::ArcRemoval)
    }

    pub fn count_noops(&self, from: Timestamp, until: Timestamp) -> usize {
        self.count_operations(from, until, OperationKind::NoOp)
    }

    fn last_op_kind(&self) -> Option<OperationKind> {
        self.op_index.checked_sub(1).map(|i| self.operations[i].effective_kind())
    }

    pub fn last_op_was_vertex_addition(&self) -> bool {
        self.last_op_kind() == Some(OperationKind::VertexAddition)
    }

    pub fn last_op_was_vertex_removal(&self) -> bool {
        self.last_op_kind() == Some(OperationKind::VertexRemoval)
    }

    pub fn last_op_was_arc_addition(&self) -> bool {
        self.last_op_kind() == Some(OperationKind::ArcAddition)
    }

    pub fn last_op_was_arc_removal(&self) -> bool {
        self.last_op_kind() == Some(OperationKind::ArcRemoval)
    }

    pub fn last_op_was_noop(&self) -> bool {
        self.op_index.checked_sub(1).map(|i| &self.operations[i]).is_some_and(|op| op.kind() == OperationKind::NoOp)
    }

    /// Drops the whole log and both graphs.
    pub fn clear(&mut self) {
        *self = Self { default_arc_lifetime: self.default_arc_lifetime, ..Default::default() };
    }
}
