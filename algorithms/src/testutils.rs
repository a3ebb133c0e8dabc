//! Helpers shared by the maintainer tests: straight-line graph
//! construction, a reference BFS, and invariant checks against it.

use crate::algorithm::DynamicSsReachAlgorithm;
use crate::Level;
use dynreach_graph::{ArcId, DiGraph, VertexId};
use std::collections::{HashMap, VecDeque};

/// Builds a graph with `n` vertices and the given arcs (by vertex index).
/// Returns the graph plus the vertex and arc handles in creation order.
pub fn build_graph(n: usize, arcs: &[(usize, usize)]) -> (DiGraph, Vec<VertexId>, Vec<ArcId>) {
    let mut graph = DiGraph::new();
    let vertices: Vec<_> = (0..n).map(|_| graph.add_vertex()).collect();
    let arc_ids = arcs.iter().map(|&(t, h)| graph.add_arc(vertices[t], vertices[h])).collect();
    (graph, vertices, arc_ids)
}

/// Reference BFS distances from `source`; unreached vertices are absent.
pub fn bfs_levels(graph: &DiGraph, source: VertexId) -> HashMap<VertexId, Level> {
    let mut levels = HashMap::from([(source, 0)]);
    let mut queue = VecDeque::from([source]);
    while let Some(v) = queue.pop_front() {
        let level = levels[&v];
        let mut discovered = Vec::new();
        graph.map_outgoing_arcs(v, |_, _, h| {
            if !levels.contains_key(&h) {
                levels.insert(h, level + 1);
                discovered.push(h);
            }
        });
        queue.extend(discovered);
    }
    levels
}

/// Asserts that `path` is a directed source-to-`t` path in `graph`.
pub fn assert_is_path(graph: &DiGraph, path: &[ArcId], source: VertexId, t: VertexId) {
    assert!(!path.is_empty() || source == t, "missing path from {source} to {t}");
    let mut at = source;
    for &a in path {
        let (tail, head) = graph.arc_ends(a).expect("path arc must be in the graph");
        assert_eq!(tail, at, "path arcs must be consecutive");
        at = head;
    }
    assert_eq!(at, t, "path must end at the queried vertex");
}

/// Cross-checks a forward maintainer against the reference BFS: queries
/// must match BFS reachability and witness paths must be shortest.
pub fn check_against_bfs(algo: &mut dyn DynamicSsReachAlgorithm, graph: &DiGraph, source: VertexId) {
    check_bfs_inner(algo, graph, source, true);
}

/// Like [`check_against_bfs`] but without the shortest-path requirement,
/// for maintainers whose witness paths are valid but not minimal (the
/// multi-level tree between reruns, the incremental three-state algorithm).
pub fn check_against_bfs_relaxed(algo: &mut dyn DynamicSsReachAlgorithm, graph: &DiGraph, source: VertexId) {
    check_bfs_inner(algo, graph, source, false);
}

fn check_bfs_inner(algo: &mut dyn DynamicSsReachAlgorithm, graph: &DiGraph, source: VertexId, exact_levels: bool) {
    let levels = bfs_levels(graph, source);
    graph.map_vertices(|v| {
        let expected = levels.contains_key(&v);
        assert_eq!(
            algo.query(graph, v),
            expected,
            "{}: wrong reachability verdict for {v}",
            algo.short_name()
        );
        if expected && v != source {
            let path = algo.query_path(graph, v);
            assert_is_path(graph, &path, source, v);
            if exact_levels {
                assert_eq!(path.len() as Level, levels[&v], "{}: witness path for {v} is not shortest", algo.short_name());
            } else {
                assert!(path.len() as Level >= levels[&v], "{}: witness path for {v} shorter than BFS", algo.short_name());
            }
        }
    });
}
