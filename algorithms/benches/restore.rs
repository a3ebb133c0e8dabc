use criterion::{criterion_group, criterion_main, Criterion};
use dynreach_algorithms::{ArcEvent, BucketEsTree, DynamicSsReachAlgorithm, SimpleEsTree};
use dynreach_graph::{DiGraph, VertexId};

/// A chain with skip arcs, so deletions re-parent instead of cutting the
/// suffix off.
fn layered(n: usize) -> (DiGraph, Vec<VertexId>) {
    let mut graph = DiGraph::new();
    let vs: Vec<_> = (0..n).map(|_| graph.add_vertex()).collect();
    for i in 0..n - 1 {
        graph.add_arc(vs[i], vs[i + 1]);
    }
    for i in 0..n - 2 {
        graph.add_arc(vs[i], vs[i + 2]);
    }
    (graph, vs)
}

fn bench_restore(c: &mut Criterion) {
    let mut group = c.benchmark_group("restore_after_deletion");
    let n = 1_000;

    group.bench_function("bucket_es_tree", |b| {
        let (mut graph, vs) = layered(n);
        let mut algo = BucketEsTree::new();
        algo.on_graph_set(&graph);
        algo.set_source(vs[0]);
        algo.run(&graph);
        let mut i = 1;
        b.iter(|| {
            let arc = graph.find_arc(vs[i], vs[i + 1]).unwrap();
            graph.remove_arc(arc);
            algo.on_arc_remove(&graph, ArcEvent { arc, tail: vs[i], head: vs[i + 1] }).unwrap();
            let arc = graph.add_arc(vs[i], vs[i + 1]);
            algo.on_arc_add(&graph, ArcEvent { arc, tail: vs[i], head: vs[i + 1] }).unwrap();
            i = 1 + (i + 1) % (n - 2);
        });
    });

    group.bench_function("simple_es_tree", |b| {
        let (mut graph, vs) = layered(n);
        let mut algo = SimpleEsTree::new();
        algo.on_graph_set(&graph);
        algo.set_source(vs[0]);
        algo.run(&graph);
        let mut i = 1;
        b.iter(|| {
            let arc = graph.find_arc(vs[i], vs[i + 1]).unwrap();
            graph.remove_arc(arc);
            algo.on_arc_remove(&graph, ArcEvent { arc, tail: vs[i], head: vs[i + 1] }).unwrap();
            let arc = graph.add_arc(vs[i], vs[i + 1]);
            algo.on_arc_add(&graph, ArcEvent { arc, tail: vs[i], head: vs[i + 1] }).unwrap();
            i = 1 + (i + 1) % (n - 2);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_restore);
criterion_main!(benches);
