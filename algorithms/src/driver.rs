//! Wiring between a [`DynamicDiGraph`] replay and a set of algorithms.

use crate::algorithm::{ArcEvent, DynamicDiGraphAlgorithm};
use crate::errors::Result;
use dynreach_graph::{DiGraph, DynamicDiGraph, GraphUpdate};

/// Dispatches one graph update to every attached algorithm whose auto-update
/// flag is on.
pub fn deliver(algorithms: &mut [&mut dyn DynamicDiGraphAlgorithm], graph: &DiGraph, update: GraphUpdate) -> Result<()> {
    for algo in algorithms.iter_mut() {
        if !algo.auto_update() {
            continue;
        }
        match update {
            GraphUpdate::VertexAdded(v) => algo.on_vertex_add(graph, v)?,
            GraphUpdate::VertexRemoved(v) => algo.on_vertex_remove(graph, v)?,
            GraphUpdate::ArcAdded { arc, tail, head } => algo.on_arc_add(graph, ArcEvent { arc, tail, head })?,
            GraphUpdate::ArcRemoved { arc, tail, head } => algo.on_arc_remove(graph, ArcEvent { arc, tail, head })?,
            GraphUpdate::ArcWeightChanged { arc, weight } => algo.on_arc_weight_change(graph, arc, weight)?,
        }
    }
    Ok(())
}

/// Attaches the algorithms to the host's current graph.
pub fn set_graph(dynamic: &DynamicDiGraph, algorithms: &mut [&mut dyn DynamicDiGraphAlgorithm]) {
    for algo in algorithms.iter_mut() {
        algo.on_graph_set(dynamic.current_graph());
    }
}

/// Replays the next operation, feeding its updates to the algorithms.
/// Returns whether an operation was applied.
pub fn apply_next_op(
    dynamic: &mut DynamicDiGraph,
    same_timestamp: bool,
    algorithms: &mut [&mut dyn DynamicDiGraphAlgorithm],
) -> Result<bool> {
    let mut outcome = Ok(());
    let advanced = dynamic.apply_next_op_observed(same_timestamp, |graph, update| {
        if outcome.is_ok() {
            outcome = deliver(algorithms, graph, update);
        }
    });
    outcome.map(|_| advanced)
}

/// Replays the next delta, feeding its updates to the algorithms. Returns
/// whether anything was applied.
pub fn apply_next_delta(dynamic: &mut DynamicDiGraph, algorithms: &mut [&mut dyn DynamicDiGraphAlgorithm]) -> Result<bool> {
    let mut outcome = Ok(());
    let advanced = dynamic.apply_next_delta_observed(|graph, update| {
        if outcome.is_ok() {
            outcome = deliver(algorithms, graph, update);
        }
    });
    outcome.map(|_| advanced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::DynamicSsReachAlgorithm;
    use crate::{BucketEsTree, SimpleEsTree};

    #[test]
    fn test_driver_feeds_attached_algorithms() {
        let mut dynamic = DynamicDiGraph::new();
        dynamic.add_arc(0, 1, 0, false).unwrap();
        dynamic.add_arc(1, 2, 1, false).unwrap();
        dynamic.remove_arc(0, 1, 2).unwrap();

        let mut bucket = BucketEsTree::new();
        let mut simple = SimpleEsTree::new();
        let mut detached = SimpleEsTree::new();

        assert!(dynamic.apply_next_delta());
        let source = dynamic.vertex_for_id(0).unwrap();
        for algo in [&mut bucket as &mut dyn DynamicSsReachAlgorithm, &mut simple, &mut detached] {
            algo.on_graph_set(dynamic.current_graph());
            algo.set_source(source);
            algo.run(dynamic.current_graph());
        }
        detached.set_auto_update(false);

        {
            let mut algorithms: Vec<&mut dyn DynamicDiGraphAlgorithm> = vec![&mut bucket, &mut simple, &mut detached];
            while apply_next_delta(&mut dynamic, &mut algorithms).unwrap() {}
        }

        let graph = dynamic.current_graph();
        let v1 = dynamic.vertex_for_id(1).unwrap();
        let v2 = dynamic.vertex_for_id(2).unwrap();
        assert!(!bucket.query(graph, v1));
        assert!(!bucket.query(graph, v2));
        assert!(!simple.query(graph, v2));
        // the detached algorithm saw none of the updates
        assert!(detached.query(graph, v1));
    }
}
