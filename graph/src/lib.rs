//! Directed graphs that evolve over time.
//!
//! The crate provides two layers: [`DiGraph`], an arena-backed directed
//! multigraph with stable vertex and arc handles, and [`DynamicDiGraph`], an
//! append-only operation log keyed by non-decreasing timestamps that can be
//! replayed into a [`DiGraph`] snapshot, one operation or one delta at a
//! time, while reporting every atomic change to an observer.

pub mod digraph;
pub mod dynamic;
pub mod errors;
pub mod operations;
pub mod statistics;
pub mod types;
pub mod weighted;

pub use digraph::DiGraph;
pub use dynamic::{DynamicDiGraph, GraphUpdate};
pub use errors::{GraphError, GraphResult};
pub use types::{ArcId, Timestamp, VertexId, VertexIdentifier, Weight};
pub use weighted::DynamicWeightedDiGraph;
