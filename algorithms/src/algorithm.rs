use crate::errors::Result;
use dynreach_graph::{ArcId, DiGraph, VertexId, Weight};

/// Payload of an arc event. The endpoints are part of the event because a
/// removal is delivered after the arc left the graph, when its handle can no
/// longer be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArcEvent {
    pub arc: ArcId,
    pub tail: VertexId,
    pub head: VertexId,
}

impl ArcEvent {
    pub fn is_loop(&self) -> bool {
        self.tail == self.head
    }
}

/// An algorithm fed by the update events of a dynamic directed graph.
///
/// Handlers run to completion before any other method may be called; the
/// graph is borrowed per call and never stored, so the host remains the
/// single writer of the topology. Algorithms override only the events they
/// care about.
pub trait DynamicDiGraphAlgorithm {
    fn name(&self) -> String;

    fn short_name(&self) -> String;

    /// Uniform counter bag: profiling observations gathered on hot paths,
    /// including the soft-cancellation counters (`reruns`, …).
    fn profile(&self) -> Vec<(&'static str, u64)> {
        Vec::new()
    }

    /// Whether the driver should feed events to this algorithm.
    fn auto_update(&self) -> bool;

    fn set_auto_update(&mut self, auto_update: bool);

    /// Called when the algorithm is attached to a graph: drops all internal
    /// state derived from a previous graph.
    fn on_graph_set(&mut self, graph: &DiGraph);

    /// Called when the algorithm is detached; releases per-vertex storage.
    fn on_graph_unset(&mut self);

    fn on_vertex_add(&mut self, _graph: &DiGraph, _v: VertexId) -> Result<()> {
        Ok(())
    }

    fn on_vertex_remove(&mut self, _graph: &DiGraph, _v: VertexId) -> Result<()> {
        Ok(())
    }

    fn on_arc_add(&mut self, _graph: &DiGraph, _arc: ArcEvent) -> Result<()> {
        Ok(())
    }

    fn on_arc_remove(&mut self, _graph: &DiGraph, _arc: ArcEvent) -> Result<()> {
        Ok(())
    }

    /// Weight changes do not affect reachability; algorithms over weighted
    /// graphs may still observe them.
    fn on_arc_weight_change(&mut self, _graph: &DiGraph, _arc: ArcId, _weight: Weight) -> Result<()> {
        Ok(())
    }
}

/// A dynamic single-source reachability algorithm.
pub trait DynamicSsReachAlgorithm: DynamicDiGraphAlgorithm {
    fn set_source(&mut self, source: VertexId);

    fn source(&self) -> Option<VertexId>;

    /// Forces full (re-)initialization from the current graph. A no-op if
    /// the algorithm is already initialized.
    fn run(&mut self, graph: &DiGraph);

    /// Whether the source reaches `t`. An uninitialized algorithm
    /// initializes itself first.
    fn query(&mut self, graph: &DiGraph, t: VertexId) -> bool;

    /// The arcs of a source-to-`t` tree path, in source-to-`t` order; empty
    /// if `t` is the source or unreachable.
    fn query_path(&mut self, graph: &DiGraph, t: VertexId) -> Vec<ArcId>;
}
