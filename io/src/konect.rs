//! Reader for KONECT-style dynamic network files.
//!
//! One record per line, whitespace-separated: `tail head [weight]
//! [timestamp]`. A non-positive weight encodes the removal of the arc, a
//! positive or absent weight its addition; a missing timestamp means `0`.
//! Lines starting with `%` or `#` are comments. Records are stable-sorted
//! by timestamp before being recorded, so equal timestamps keep file order.

use crate::errors::{ReadError, ReadResult};
use dynreach_graph::{DynamicDiGraph, DynamicWeightedDiGraph, Timestamp, VertexIdentifier};
use log::{info, warn};
use std::fmt::Write as _;
use std::io::BufRead;

#[derive(Debug, Clone, Copy)]
struct Entry {
    tail: VertexIdentifier,
    head: VertexIdentifier,
    /// Raw third-column value; `1` when the column is absent.
    weight: i64,
    timestamp: Timestamp,
}

/// Reader configuration plus the accumulated error buffer of the last run.
#[derive(Debug)]
pub struct KonectReader {
    /// Pull implied vertex additions in front of the whole operation log.
    pub antedate_vertex_additions: bool,
    /// Drop endpoints that an arc removal leaves isolated.
    pub remove_isolated_ends: bool,
    /// Stop after this many distinct timestamps (`0`: no limit).
    pub limit_num_timestamps: usize,
    /// Fail on any malformed line instead of accumulating and skipping.
    pub strict: bool,
    /// Schedule every added arc for automatic removal after this many
    /// deltas (`0`: arcs are permanent).
    pub arc_lifetime: usize,
    /// In weighted mode, treat the third column as a relative weight
    /// adjustment instead of an absolute weight.
    pub relative_weights: bool,
    /// In weighted mode, a weight dropping to or arriving at zero or below
    /// removes the arc.
    pub remove_non_positive_arcs: bool,

    last_error: String,
}

impl Default for KonectReader {
    fn default() -> Self {
        Self {
            antedate_vertex_additions: false,
            remove_isolated_ends: false,
            limit_num_timestamps: 0,
            strict: false,
            arc_lifetime: 0,
            relative_weights: false,
            remove_non_positive_arcs: true,
            last_error: String::new(),
        }
    }
}

impl KonectReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages describing the lines that could not be used, one per line.
    pub fn last_error(&self) -> &str {
        &self.last_error
    }

    pub fn read(&mut self, input: impl BufRead) -> ReadResult<DynamicDiGraph> {
        self.last_error.clear();
        let entries = self.parse_entries(input)?;

        info!("creating dynamic digraph from {} records", entries.len());
        let mut graph = DynamicDiGraph::new();
        graph.set_remove_isolated_ends(self.remove_isolated_ends);

        let mut num_timestamps = 0usize;
        let mut last_timestamp = None;
        for entry in entries {
            if last_timestamp != Some(entry.timestamp) {
                if self.limit_num_timestamps > 0 && num_timestamps >= self.limit_num_timestamps {
                    info!("stopping after {num_timestamps} timestamps at time {:?}", last_timestamp);
                    break;
                }
                num_timestamps += 1;
                last_timestamp = Some(entry.timestamp);
            }

            let outcome = if entry.weight > 0 {
                if self.arc_lifetime > 0 {
                    graph.add_arc_for(entry.tail, entry.head, entry.timestamp, self.arc_lifetime, self.antedate_vertex_additions)
                } else {
                    graph.add_arc(entry.tail, entry.head, entry.timestamp, self.antedate_vertex_additions)
                }
            } else {
                graph.remove_arc(entry.tail, entry.head, entry.timestamp)
            };
            if let Err(e) = outcome {
                warn!("skipping record ({}, {}) at time {}: {e}", entry.tail, entry.head, entry.timestamp);
                let _ = writeln!(self.last_error, "({}, {}) @ {}: {e}", entry.tail, entry.head, entry.timestamp);
                if self.strict {
                    return Err(ReadError::Parse(self.last_error.clone()));
                }
            }
        }
        Ok(graph)
    }

    /// Reads the stream into a weighted dynamic graph: the third column is a
    /// real weight (absolute, or an adjustment in relative mode) rather than
    /// an addition/removal sign.
    pub fn read_weighted(&mut self, input: impl BufRead) -> ReadResult<DynamicWeightedDiGraph> {
        self.last_error.clear();
        let entries = self.parse_entries(input)?;

        info!("creating dynamic weighted digraph from {} records", entries.len());
        let mut weighted = DynamicWeightedDiGraph::new(0);
        weighted.graph_mut().set_remove_isolated_ends(self.remove_isolated_ends);

        let mut num_timestamps = 0usize;
        let mut last_timestamp = None;
        for entry in entries {
            if last_timestamp != Some(entry.timestamp) {
                if self.limit_num_timestamps > 0 && num_timestamps >= self.limit_num_timestamps {
                    info!("stopping after {num_timestamps} timestamps at time {:?}", last_timestamp);
                    break;
                }
                num_timestamps += 1;
                last_timestamp = Some(entry.timestamp);
            }

            let outcome = if self.relative_weights {
                weighted.adjust_arc_weight(
                    entry.tail,
                    entry.head,
                    entry.weight.unsigned_abs(),
                    entry.weight >= 0,
                    self.remove_non_positive_arcs,
                    entry.timestamp,
                )
            } else if self.remove_non_positive_arcs && entry.weight <= 0 {
                weighted.remove_weighted_arc(entry.tail, entry.head, entry.timestamp)
            } else {
                weighted.add_weighted_arc_or_change_weight(entry.tail, entry.head, entry.weight.max(0) as u64, entry.timestamp)
            };
            if let Err(e) = outcome {
                warn!("skipping record ({}, {}) at time {}: {e}", entry.tail, entry.head, entry.timestamp);
                let _ = writeln!(self.last_error, "({}, {}) @ {}: {e}", entry.tail, entry.head, entry.timestamp);
                if self.strict {
                    return Err(ReadError::Parse(self.last_error.clone()));
                }
            }
        }
        Ok(weighted)
    }

    fn parse_entries(&mut self, input: impl BufRead) -> ReadResult<Vec<Entry>> {
        let mut entries = Vec::new();
        for line in input.lines() {
            let line = line?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() || tokens[0].starts_with(['%', '#']) {
                continue;
            }

            if tokens.len() < 2 || (self.strict && tokens.len() != 4) {
                let _ = writeln!(self.last_error, "{line}: each record needs tail, head, and optionally weight and timestamp");
                if self.strict {
                    return Err(ReadError::Parse(self.last_error.clone()));
                }
                continue;
            }

            let parsed = (|| {
                let tail: VertexIdentifier = tokens[0].parse().ok()?;
                let head: VertexIdentifier = tokens[1].parse().ok()?;
                let weight = match tokens.get(2) {
                    Some(w) => w.parse::<i64>().ok()?,
                    None => 1,
                };
                let timestamp: Timestamp = match tokens.get(3) {
                    Some(t) => t.parse().ok()?,
                    None => 0,
                };
                Some(Entry { tail, head, weight, timestamp })
            })();
            match parsed {
                Some(entry) => entries.push(entry),
                None => {
                    let _ = writeln!(self.last_error, "{line}: could not parse record");
                    if self.strict {
                        return Err(ReadError::Parse(self.last_error.clone()));
                    }
                }
            }
        }

        entries.sort_by_key(|e| e.timestamp);
        Ok(entries)
    }
}
