use crate::dynamic::DynamicDiGraph;
use itertools::{Itertools, MinMaxResult};

/// Per-delta summary of one class of operations.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct DeltaStatistic {
    pub total: usize,
    pub min: usize,
    pub max: usize,
    pub mean: f64,
}

impl DeltaStatistic {
    fn compute(per_delta: &[usize]) -> Self {
        let total = per_delta.iter().sum();
        let (min, max) = match per_delta.iter().copied().minmax() {
            MinMaxResult::NoElements => (0, 0),
            MinMaxResult::OneElement(x) => (x, x),
            MinMaxResult::MinMax(lo, hi) => (lo, hi),
        };
        let mean = if per_delta.is_empty() { 0.0 } else { total as f64 / per_delta.len() as f64 };
        Self { total, min, max, mean }
    }
}

/// Operation-mix statistics of a recorded dynamic graph, aggregated per
/// delta over the whole timeline.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DynamicDiGraphStatistics {
    pub num_deltas: usize,
    pub vertex_additions: DeltaStatistic,
    pub vertex_removals: DeltaStatistic,
    pub arc_additions: DeltaStatistic,
    pub arc_removals: DeltaStatistic,
    pub noops: DeltaStatistic,
}

impl DynamicDiGraphStatistics {
    pub fn analyze(graph: &DynamicDiGraph) -> Self {
        let times = graph.timestamps();
        let collect = |f: &dyn Fn(u64) -> usize| times.iter().map(|&t| f(t)).collect_vec();
        let vertex_additions = collect(&|t| graph.count_vertex_additions(t, t));
        let vertex_removals = collect(&|t| graph.count_vertex_removals(t, t));
        let arc_additions = collect(&|t| graph.count_arc_additions(t, t));
        let arc_removals = collect(&|t| graph.count_arc_removals(t, t));
        let noops = collect(&|t| graph.count_noops(t, t));
        Self {
            num_deltas: times.len(),
            vertex_additions: DeltaStatistic::compute(&vertex_additions),
            vertex_removals: DeltaStatistic::compute(&vertex_removals),
            arc_additions: DeltaStatistic::compute(&arc_additions),
            arc_removals: DeltaStatistic::compute(&arc_removals),
            noops: DeltaStatistic::compute(&noops),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_mix() {
        let mut dyg = DynamicDiGraph::new();
        dyg.add_arc(0, 1, 0, false).unwrap();
        dyg.add_arc(1, 2, 0, false).unwrap();
        dyg.add_arc(2, 3, 1, false).unwrap();
        dyg.remove_arc(0, 1, 2).unwrap();
        dyg.noop(3).unwrap();

        let stats = DynamicDiGraphStatistics::analyze(&dyg);
        assert_eq!(stats.num_deltas, 4);
        assert_eq!(stats.arc_additions.total, 3);
        assert_eq!(stats.arc_additions.max, 2);
        assert_eq!(stats.arc_additions.min, 0);
        assert_eq!(stats.arc_removals.total, 1);
        assert_eq!(stats.vertex_additions.total, 4);
        assert_eq!(stats.noops.total, 1);
        assert!((stats.arc_additions.mean - 0.75).abs() < 1e-9);
    }
}
