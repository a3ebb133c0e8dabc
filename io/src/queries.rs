//! Reader for timestamped reachability query files.
//!
//! Each non-comment line starts with a timestamp followed by the vertex
//! identifiers to query once the graph has replayed that delta. The result
//! is aligned with the graph's timeline: one (possibly empty) batch per
//! delta. Queries for timestamps that never occur in the timeline are
//! reported and dropped.

use crate::errors::ReadResult;
use dynreach_graph::{DynamicDiGraph, Timestamp, VertexIdentifier};
use log::warn;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::BufRead;

#[derive(Debug, Default)]
pub struct QueryReader {
    last_error: String,
}

impl QueryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    /// Reads the query schedule and aligns it with `graph`'s timeline. The
    /// graph is rewound to its big-bang state as a side effect.
    pub fn read(&mut self, input: impl BufRead, graph: &mut DynamicDiGraph) -> ReadResult<Vec<Vec<VertexIdentifier>>> {
        self.last_error.clear();
        let mut by_time: BTreeMap<Timestamp, Vec<VertexIdentifier>> = BTreeMap::new();
        for line in input.lines() {
            let line = line?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() || tokens[0].starts_with(['%', '#']) {
                continue;
            }
            let parsed: Option<Vec<u64>> = tokens.iter().map(|t| t.parse().ok()).collect();
            match parsed {
                Some(numbers) => by_time.entry(numbers[0]).or_default().extend(&numbers[1..]),
                None => {
                    let _ = writeln!(self.last_error, "{line}: could not parse query line");
                }
            }
        }

        graph.reset_to_big_bang();
        let timeline = graph.timestamps().to_vec();
        let mut batches = Vec::with_capacity(timeline.len());
        for &time in &timeline {
            batches.push(by_time.remove(&time).unwrap_or_default());
        }
        for (time, queries) in by_time {
            warn!("queries for time {time} are ignored: not in the graph's timeline");
            let _ = writeln!(self.last_error, "{} queries for time {time} are ignored", queries.len());
        }

        // a trailing delta of nothing but no-ops carries no queries
        if let Some(&last) = timeline.last() {
            if graph.size_of_final_delta() == graph.count_noops(last, last) && !batches.is_empty() {
                batches.pop();
            }
        }

        Ok(batches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> DynamicDiGraph {
        let mut graph = DynamicDiGraph::new();
        graph.add_arc(0, 1, 0, false).unwrap();
        graph.add_arc(1, 2, 2, false).unwrap();
        graph.add_arc(2, 3, 5, false).unwrap();
        graph
    }

    #[test]
    fn test_alignment_with_timeline() {
        let mut graph = sample_graph();
        let input = "% queries\n0 1 2\n5 3\n";
        let batches = QueryReader::new().read(input.as_bytes(), &mut graph).unwrap();
        assert_eq!(batches, vec![vec![1, 2], vec![], vec![3]]);
    }

    #[test]
    fn test_unknown_timestamps_are_dropped() {
        let mut graph = sample_graph();
        let input = "1 7\n2 2\n9 1\n";
        let mut reader = QueryReader::new();
        let batches = reader.read(input.as_bytes(), &mut graph).unwrap();
        assert_eq!(batches, vec![vec![], vec![2], vec![]]);
        assert_eq!(reader.last_error().lines().count(), 2);
    }

    #[test]
    fn test_trailing_noop_delta_has_no_queries() {
        let mut graph = sample_graph();
        graph.noop(8).unwrap();
        let batches = QueryReader::new().read("0 1\n".as_bytes(), &mut graph).unwrap();
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0], vec![1]);
    }

    #[test]
    fn test_queries_for_same_time_merge() {
        let mut graph = sample_graph();
        let input = "2 1\n2 2 3\n";
        let batches = QueryReader::new().read(input.as_bytes(), &mut graph).unwrap();
        assert_eq!(batches[1], vec![1, 2, 3]);
    }
}
