//! End-to-end behavior of the five maintainers against replayed updates.

use dynreach_algorithms::testutils::{assert_is_path, bfs_levels, check_against_bfs, check_against_bfs_relaxed};
use dynreach_algorithms::{
    ArcEvent, BucketEsTree, DynamicDiGraphAlgorithm, DynamicSsReachAlgorithm, EsTreeParams, MultiLevelEsTree,
    QueueEsTree, SimpleEsTree, SimpleIncParams, SimpleIncSsReach,
};
use dynreach_graph::{DiGraph, DynamicDiGraph, GraphUpdate, VertexId};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Whether a maintainer guarantees shortest witness paths at every point.
fn forward_maintainers() -> Vec<(Box<dyn DynamicSsReachAlgorithm>, bool)> {
    vec![
        (Box::new(BucketEsTree::new()) as Box<dyn DynamicSsReachAlgorithm>, true),
        (Box::new(QueueEsTree::new()), true),
        (Box::new(MultiLevelEsTree::new()), false),
        (Box::new(SimpleEsTree::new()), true),
        (Box::new(SimpleIncSsReach::new()), false),
        (Box::new(SimpleIncSsReach::with_params(SimpleIncParams { radical_reset: true, ..Default::default() })), false),
        (Box::new(SimpleIncSsReach::with_params(SimpleIncParams { reverse_iteration: true, search_forward: false, ..Default::default() })), false),
    ]
}

fn deliver(algo: &mut dyn DynamicSsReachAlgorithm, graph: &DiGraph, update: GraphUpdate) {
    let result = match update {
        GraphUpdate::VertexAdded(v) => algo.on_vertex_add(graph, v),
        GraphUpdate::VertexRemoved(v) => algo.on_vertex_remove(graph, v),
        GraphUpdate::ArcAdded { arc, tail, head } => algo.on_arc_add(graph, ArcEvent { arc, tail, head }),
        GraphUpdate::ArcRemoved { arc, tail, head } => algo.on_arc_remove(graph, ArcEvent { arc, tail, head }),
        GraphUpdate::ArcWeightChanged { arc, weight } => algo.on_arc_weight_change(graph, arc, weight),
    };
    result.unwrap_or_else(|e| panic!("{}: {e}", algo.short_name()));
}

fn replay_next_delta(dynamic: &mut DynamicDiGraph, algo: &mut dyn DynamicSsReachAlgorithm) -> bool {
    dynamic.apply_next_delta_observed(|graph, update| deliver(algo, graph, update))
}

fn check(algo: &mut dyn DynamicSsReachAlgorithm, graph: &DiGraph, source: VertexId, exact: bool) {
    if exact {
        check_against_bfs(algo, graph, source);
    } else {
        check_against_bfs_relaxed(algo, graph, source);
    }
}

/// Chain growth: 0→1→2→3 at time 0, then the shortcut 0→3 at time 1.
#[test]
fn test_chain_growth() {
    for (mut algo, exact) in forward_maintainers() {
        let mut dynamic = DynamicDiGraph::new();
        dynamic.add_arc(0, 1, 0, false).unwrap();
        dynamic.add_arc(1, 2, 0, false).unwrap();
        dynamic.add_arc(2, 3, 0, false).unwrap();
        dynamic.add_arc(0, 3, 1, false).unwrap();

        assert!(replay_next_delta(&mut dynamic, algo.as_mut()));
        let source = dynamic.vertex_for_id(0).unwrap();
        algo.on_graph_set(dynamic.current_graph());
        algo.set_source(source);
        algo.run(dynamic.current_graph());

        let graph = dynamic.current_graph();
        let v3 = dynamic.vertex_for_id(3).unwrap();
        check(algo.as_mut(), graph, source, exact);
        assert_eq!(algo.query_path(graph, v3).len(), 3, "{}", algo.short_name());

        assert!(replay_next_delta(&mut dynamic, algo.as_mut()));
        let graph = dynamic.current_graph();
        check(algo.as_mut(), graph, source, exact);
        // the trees re-parent 3 onto the source through the new arc; the
        // three-state algorithm keeps its old witness for a reachable head
        if !algo.short_name().starts_with("Simple-ISSR") {
            let path = algo.query_path(graph, v3);
            assert_eq!(path.len(), 1, "{}", algo.short_name());
            assert_eq!(graph.arc_ends(path[0]), Some((source, v3)));
        }
    }
}

/// Path break: removing 2→3 from the chain 0→1→2→3→4 cuts off 3 and 4.
#[test]
fn test_path_break() {
    for (mut algo, exact) in forward_maintainers() {
        let mut dynamic = DynamicDiGraph::new();
        for i in 0..4 {
            dynamic.add_arc(i, i + 1, 0, false).unwrap();
        }
        dynamic.remove_arc(2, 3, 1).unwrap();

        assert!(replay_next_delta(&mut dynamic, algo.as_mut()));
        let source = dynamic.vertex_for_id(0).unwrap();
        algo.on_graph_set(dynamic.current_graph());
        algo.set_source(source);
        algo.run(dynamic.current_graph());

        let (v2, v3, v4) = (dynamic.vertex_for_id(2).unwrap(), dynamic.vertex_for_id(3).unwrap(), dynamic.vertex_for_id(4).unwrap());
        assert!(replay_next_delta(&mut dynamic, algo.as_mut()));
        let graph = dynamic.current_graph();
        assert!(!algo.query(graph, v3), "{}", algo.short_name());
        assert!(!algo.query(graph, v4), "{}", algo.short_name());
        assert!(algo.query(graph, v2), "{}", algo.short_name());
        assert!(algo.query_path(graph, v3).is_empty());
        check(algo.as_mut(), graph, source, exact);
    }
}

/// Alternate path: with 0→1→2 and 0→3→2, removing 1→2 re-parents 2 onto 3.
#[test]
fn test_alternate_path() {
    for (mut algo, exact) in forward_maintainers() {
        let mut dynamic = DynamicDiGraph::new();
        dynamic.add_arc(0, 1, 0, false).unwrap();
        dynamic.add_arc(1, 2, 0, false).unwrap();
        dynamic.add_arc(0, 3, 0, false).unwrap();
        dynamic.add_arc(3, 2, 0, false).unwrap();
        dynamic.remove_arc(1, 2, 1).unwrap();

        assert!(replay_next_delta(&mut dynamic, algo.as_mut()));
        let source = dynamic.vertex_for_id(0).unwrap();
        algo.on_graph_set(dynamic.current_graph());
        algo.set_source(source);
        algo.run(dynamic.current_graph());

        assert!(replay_next_delta(&mut dynamic, algo.as_mut()));
        let graph = dynamic.current_graph();
        let (v2, v3) = (dynamic.vertex_for_id(2).unwrap(), dynamic.vertex_for_id(3).unwrap());
        assert!(algo.query(graph, v2), "{}", algo.short_name());
        let path = algo.query_path(graph, v2);
        assert_eq!(path.len(), 2, "{}", algo.short_name());
        assert_eq!(graph.arc_ends(path[0]), Some((source, v3)));
        assert_eq!(graph.arc_ends(path[1]), Some((v3, v2)));
        check(algo.as_mut(), graph, source, exact);
    }
}

/// Tie-break: with two same-level predecessors, losing the tree arc makes
/// the surviving predecessor the parent; the tie at insertion time sticks
/// with the lower slot.
#[test]
fn test_tie_break_determinism() {
    for (mut algo, _) in forward_maintainers() {
        let mut graph = DiGraph::new();
        let vs: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
        algo.on_graph_set(&graph);
        algo.set_source(vs[0]);
        algo.run(&graph);

        let mut arcs = Vec::new();
        for &(t, h) in &[(0, 1), (0, 2), (1, 3), (2, 3)] {
            let a = graph.add_arc(vs[t], vs[h]);
            arcs.push(a);
            deliver(algo.as_mut(), &graph, GraphUpdate::ArcAdded { arc: a, tail: vs[t], head: vs[h] });
        }
        // 1→3 arrived first, so the tree arc of 3 is 1→3
        let path = algo.query_path(&graph, vs[3]);
        assert_eq!(path.last().copied(), Some(arcs[2]), "{}", algo.short_name());

        graph.remove_arc(arcs[2]);
        deliver(algo.as_mut(), &graph, GraphUpdate::ArcRemoved { arc: arcs[2], tail: vs[1], head: vs[3] });
        assert!(algo.query(&graph, vs[3]), "{}", algo.short_name());
        let path = algo.query_path(&graph, vs[3]);
        assert_eq!(path.len(), 2);
        assert_eq!(path.last().copied(), Some(arcs[3]), "{}", algo.short_name());
    }
}

/// Rerun trigger: with a tight affected budget, breaking a 10-chain at the
/// top abandons the incremental pass and recomputes.
#[test]
fn test_rerun_trigger() {
    let params = EsTreeParams { requeue_limit: 5, max_affected_ratio: 0.1 };
    let trees: Vec<Box<dyn DynamicSsReachAlgorithm>> = vec![
        Box::new(BucketEsTree::with_params(params)),
        Box::new(QueueEsTree::with_params(params)),
        Box::new(MultiLevelEsTree::with_params(params)),
        Box::new(SimpleEsTree::with_params(params)),
    ];
    for mut algo in trees {
        let mut graph = DiGraph::new();
        let vs: Vec<_> = (0..10).map(|_| graph.add_vertex()).collect();
        let arcs: Vec<_> = (0..9).map(|i| graph.add_arc(vs[i], vs[i + 1])).collect();
        algo.on_graph_set(&graph);
        algo.set_source(vs[0]);
        algo.run(&graph);

        graph.remove_arc(arcs[0]);
        deliver(algo.as_mut(), &graph, GraphUpdate::ArcRemoved { arc: arcs[0], tail: vs[0], head: vs[1] });

        for &v in &vs[1..] {
            assert!(!algo.query(&graph, v), "{}", algo.short_name());
        }
        let profile = algo.profile();
        let reruns = profile.iter().find(|(k, _)| *k == "reruns").unwrap().1;
        assert_eq!(reruns, 1, "{}", algo.short_name());
    }
}

/// Traceback: after losing its predecessor arc 3→2, vertex 2 finds the
/// reachable ancestor 1 backwards and stays reachable.
#[test]
fn test_simple_inc_traceback() {
    let mut algo = SimpleIncSsReach::new();
    let mut graph = DiGraph::new();
    let vs: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
    algo.on_graph_set(&graph);
    algo.set_source(vs[0]);
    algo.run(&graph);

    // insertion order makes 3→2 the predecessor arc of 2
    let mut arcs = Vec::new();
    for &(t, h) in &[(0, 3), (3, 2), (0, 1), (1, 2)] {
        let a = graph.add_arc(vs[t], vs[h]);
        arcs.push(a);
        deliver(&mut algo, &graph, GraphUpdate::ArcAdded { arc: a, tail: vs[t], head: vs[h] });
    }
    assert_eq!(algo.query_path(&graph, vs[2]).last().copied(), Some(arcs[1]));

    graph.remove_arc(arcs[1]);
    deliver(&mut algo, &graph, GraphUpdate::ArcRemoved { arc: arcs[1], tail: vs[3], head: vs[2] });

    assert!(algo.query(&graph, vs[2]));
    let path = algo.query_path(&graph, vs[2]);
    assert_eq!(path, vec![arcs[2], arcs[3]]);
    let tracebacks = algo.profile().iter().find(|(k, _)| *k == "total_tracebacks").unwrap().1;
    assert_eq!(tracebacks, 1);
}

/// Loops, arcs into the source, and arcs out of unreachable tails change
/// nothing; removals on already-unreachable heads are no-ops.
#[test]
fn test_boundary_behaviors() {
    for (mut algo, exact) in forward_maintainers() {
        let mut graph = DiGraph::new();
        let vs: Vec<_> = (0..5).map(|_| graph.add_vertex()).collect();
        let a01 = graph.add_arc(vs[0], vs[1]);
        algo.on_graph_set(&graph);
        algo.set_source(vs[0]);
        algo.run(&graph);
        let _ = a01;

        // self-loop
        let aloop = graph.add_arc(vs[1], vs[1]);
        deliver(algo.as_mut(), &graph, GraphUpdate::ArcAdded { arc: aloop, tail: vs[1], head: vs[1] });
        // arc into the source
        let a10 = graph.add_arc(vs[1], vs[0]);
        deliver(algo.as_mut(), &graph, GraphUpdate::ArcAdded { arc: a10, tail: vs[1], head: vs[0] });
        // arc between unreachable vertices
        let a34 = graph.add_arc(vs[3], vs[4]);
        deliver(algo.as_mut(), &graph, GraphUpdate::ArcAdded { arc: a34, tail: vs[3], head: vs[4] });
        check(algo.as_mut(), &graph, vs[0], exact);
        assert!(!algo.query(&graph, vs[4]), "{}", algo.short_name());

        // removing an arc whose head is unreachable
        graph.remove_arc(a34);
        deliver(algo.as_mut(), &graph, GraphUpdate::ArcRemoved { arc: a34, tail: vs[3], head: vs[4] });
        graph.remove_arc(aloop);
        deliver(algo.as_mut(), &graph, GraphUpdate::ArcRemoved { arc: aloop, tail: vs[1], head: vs[1] });
        graph.remove_arc(a10);
        deliver(algo.as_mut(), &graph, GraphUpdate::ArcRemoved { arc: a10, tail: vs[1], head: vs[0] });
        check(algo.as_mut(), &graph, vs[0], exact);
    }
}

/// `run` twice without changes leaves every answer alone.
#[test]
fn test_run_is_idempotent() {
    for (mut algo, _) in forward_maintainers() {
        let mut graph = DiGraph::new();
        let vs: Vec<_> = (0..4).map(|_| graph.add_vertex()).collect();
        graph.add_arc(vs[0], vs[1]);
        graph.add_arc(vs[1], vs[2]);
        algo.on_graph_set(&graph);
        algo.set_source(vs[0]);
        algo.run(&graph);
        let before: Vec<bool> = vs.iter().map(|&v| algo.query(&graph, v)).collect();
        algo.run(&graph);
        let after: Vec<bool> = vs.iter().map(|&v| algo.query(&graph, v)).collect();
        assert_eq!(before, after, "{}", algo.short_name());
    }
}

/// Adding and immediately removing an arc leaves reachability equivalent to
/// a fresh recomputation.
#[test]
fn test_add_remove_round_trip() {
    for (mut algo, exact) in forward_maintainers() {
        let mut graph = DiGraph::new();
        let vs: Vec<_> = (0..5).map(|_| graph.add_vertex()).collect();
        graph.add_arc(vs[0], vs[1]);
        graph.add_arc(vs[1], vs[2]);
        graph.add_arc(vs[2], vs[3]);
        algo.on_graph_set(&graph);
        algo.set_source(vs[0]);
        algo.run(&graph);

        let a = graph.add_arc(vs[0], vs[3]);
        deliver(algo.as_mut(), &graph, GraphUpdate::ArcAdded { arc: a, tail: vs[0], head: vs[3] });
        graph.remove_arc(a);
        deliver(algo.as_mut(), &graph, GraphUpdate::ArcRemoved { arc: a, tail: vs[0], head: vs[3] });
        check(algo.as_mut(), &graph, vs[0], exact);
    }
}

/// Removing an arc whose head the maintainer never saw is a contract
/// violation, not a silent no-op.
#[test]
fn test_unregistered_removal_is_an_error() {
    let trees: Vec<Box<dyn DynamicSsReachAlgorithm>> = vec![
        Box::new(BucketEsTree::new()),
        Box::new(QueueEsTree::new()),
        Box::new(MultiLevelEsTree::new()),
        Box::new(SimpleEsTree::new()),
    ];
    for mut algo in trees {
        let mut graph = DiGraph::new();
        let u = graph.add_vertex();
        let v = graph.add_vertex();
        graph.add_arc(u, v);
        algo.on_graph_set(&graph);
        algo.set_source(u);
        algo.run(&graph);

        // grown behind the maintainer's back
        let w = graph.add_vertex();
        let x = graph.add_vertex();
        let a = graph.add_arc(w, x);
        graph.remove_arc(a);
        assert!(algo.on_arc_remove(&graph, ArcEvent { arc: a, tail: w, head: x }).is_err(), "{}", algo.short_name());
    }
}

/// Vertex removal through the host: incident arcs go first, the maintainers
/// follow along.
#[test]
fn test_vertex_removal_through_host() {
    for (mut algo, exact) in forward_maintainers() {
        let mut dynamic = DynamicDiGraph::new();
        dynamic.add_arc(0, 1, 0, false).unwrap();
        dynamic.add_arc(1, 2, 0, false).unwrap();
        dynamic.add_arc(2, 3, 0, false).unwrap();
        dynamic.remove_vertex(1, 1).unwrap();

        assert!(replay_next_delta(&mut dynamic, algo.as_mut()));
        let source = dynamic.vertex_for_id(0).unwrap();
        algo.on_graph_set(dynamic.current_graph());
        algo.set_source(source);
        algo.run(dynamic.current_graph());

        let (v2, v3) = (dynamic.vertex_for_id(2).unwrap(), dynamic.vertex_for_id(3).unwrap());
        assert!(replay_next_delta(&mut dynamic, algo.as_mut()));
        let graph = dynamic.current_graph();
        assert!(!algo.query(graph, v2), "{}", algo.short_name());
        assert!(!algo.query(graph, v3), "{}", algo.short_name());
        check(algo.as_mut(), graph, source, exact);
    }
}

/// The reversed variants answer single-sink reachability.
#[test]
fn test_reversed_variants() {
    let sinks: Vec<Box<dyn DynamicSsReachAlgorithm>> = vec![
        Box::new(MultiLevelEsTree::reversed(EsTreeParams::default())),
        Box::new(SimpleEsTree::reversed(EsTreeParams::default())),
    ];
    for mut algo in sinks {
        let mut graph = DiGraph::new();
        let vs: Vec<_> = (0..5).map(|_| graph.add_vertex()).collect();
        let mut arcs = Vec::new();
        for &(t, h) in &[(0, 1), (1, 3), (2, 3), (4, 0)] {
            arcs.push(graph.add_arc(vs[t], vs[h]));
        }
        algo.on_graph_set(&graph);
        algo.set_source(vs[3]);
        algo.run(&graph);

        // everything that reaches 3 answers true
        for (&v, expected) in vs.iter().zip([true, true, true, true, true]) {
            assert_eq!(algo.query(&graph, v), expected, "{}: {v}", algo.short_name());
        }
        let path = algo.query_path(&graph, vs[4]);
        assert_eq!(path.len(), 3);
        assert_eq!(graph.arc_ends(path[2]), Some((vs[4], vs[0])));

        // cutting 0→1 strands 4 and 0
        graph.remove_arc(arcs[0]);
        deliver(algo.as_mut(), &graph, GraphUpdate::ArcRemoved { arc: arcs[0], tail: vs[0], head: vs[1] });
        assert!(!algo.query(&graph, vs[0]), "{}", algo.short_name());
        assert!(!algo.query(&graph, vs[4]), "{}", algo.short_name());
        assert!(algo.query(&graph, vs[2]), "{}", algo.short_name());
    }
}

/// Parallel arcs: the multi-level tree counts copies, so losing one of two
/// parallel tree arcs changes nothing.
#[test]
fn test_multi_level_parallel_arcs() {
    let mut algo = MultiLevelEsTree::new();
    let mut graph = DiGraph::new();
    let u = graph.add_vertex();
    let v = graph.add_vertex();
    algo.on_graph_set(&graph);
    algo.set_source(u);
    algo.run(&graph);

    let a1 = graph.add_arc(u, v);
    deliver(&mut algo, &graph, GraphUpdate::ArcAdded { arc: a1, tail: u, head: v });
    let a2 = graph.add_arc(u, v);
    deliver(&mut algo, &graph, GraphUpdate::ArcAdded { arc: a2, tail: u, head: v });

    graph.remove_arc(a1);
    deliver(&mut algo, &graph, GraphUpdate::ArcRemoved { arc: a1, tail: u, head: v });
    assert!(algo.query(&graph, v));
    assert_eq!(algo.query_path(&graph, v), vec![a2]);

    graph.remove_arc(a2);
    deliver(&mut algo, &graph, GraphUpdate::ArcRemoved { arc: a2, tail: u, head: v });
    assert!(!algo.query(&graph, v));
}

/// Seeded random churn, cross-checked against a reference BFS after every
/// batch of updates.
#[test]
fn test_randomized_updates_match_bfs() {
    let mut rng = SmallRng::seed_from_u64(0x5eed);
    for (mut algo, exact) in forward_maintainers() {
        let mut graph = DiGraph::new();
        let vs: Vec<VertexId> = (0..12).map(|_| graph.add_vertex()).collect();
        algo.on_graph_set(&graph);
        algo.set_source(vs[0]);
        algo.run(&graph);

        let mut alive: Vec<dynreach_graph::ArcId> = Vec::new();
        for step in 0..400 {
            let add = alive.is_empty() || rng.gen_bool(0.6);
            if add {
                let t = vs[rng.gen_range(0..vs.len())];
                let h = vs[rng.gen_range(0..vs.len())];
                let a = graph.add_arc(t, h);
                alive.push(a);
                deliver(algo.as_mut(), &graph, GraphUpdate::ArcAdded { arc: a, tail: t, head: h });
            } else {
                let a = alive.swap_remove(rng.gen_range(0..alive.len()));
                let (t, h) = graph.arc_ends(a).unwrap();
                graph.remove_arc(a);
                deliver(algo.as_mut(), &graph, GraphUpdate::ArcRemoved { arc: a, tail: t, head: h });
            }
            if step % 7 == 0 {
                check(algo.as_mut(), &graph, vs[0], exact);
            }
        }
        check(algo.as_mut(), &graph, vs[0], exact);

        // a forced rerun settles every level to the BFS distance
        algo.on_graph_set(&graph);
        algo.set_source(vs[0]);
        algo.run(&graph);
        check_against_bfs(algo.as_mut(), &graph, vs[0]);
        let levels = bfs_levels(&graph, vs[0]);
        for (&v, &level) in &levels {
            if v != vs[0] {
                let path = algo.query_path(&graph, v);
                assert_is_path(&graph, &path, vs[0], v);
                assert_eq!(path.len() as u64, level);
            }
        }
    }
}
