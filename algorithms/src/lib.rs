//! Dynamic single-source reachability.
//!
//! Given a directed graph that evolves through arc insertions and deletions,
//! the algorithms in this crate answer, after each update, whether a fixed
//! source vertex still reaches a queried vertex, and can produce a witness
//! path. Five maintainers with a common trait surface are provided:
//!
//! - [`BucketEsTree`]: an Even–Shiloach tree processed through a
//!   level-ordered bucket queue,
//! - [`QueueEsTree`]: the same tree processed through a bounded FIFO queue,
//! - [`MultiLevelEsTree`]: an ES tree that rescans the whole in-neighbor
//!   table for a minimum-level parent on every level change, counts parallel
//!   arcs, and optionally works on reversed arcs (single-sink reachability),
//! - [`SimpleEsTree`]: a predecessor tree without an in-neighbor table,
//!   rescanning actual incoming arcs on demand,
//! - [`SimpleIncSsReach`]: a three-state incremental algorithm tuned for
//!   insertion-heavy workloads, with backward traceback on deletions.
//!
//! All maintainers consume the update events of a
//! [`dynreach_graph::DynamicDiGraph`] replay; see [`driver`].

pub mod algorithm;
pub mod driver;
pub mod errors;
pub mod estree;
pub mod queues;
pub mod simple;
pub mod simple_inc;
pub mod testutils;

pub use algorithm::{ArcEvent, DynamicDiGraphAlgorithm, DynamicSsReachAlgorithm};
pub use errors::{ReachabilityError, Result};
pub use estree::bucket::BucketEsTree;
pub use estree::fifo::QueueEsTree;
pub use estree::multi_level::MultiLevelEsTree;
pub use estree::EsTreeParams;
pub use simple::estree::SimpleEsTree;
pub use simple_inc::{SimpleIncParams, SimpleIncSsReach};

/// BFS level of a vertex, measured from the source.
pub type Level = u64;

/// Sentinel level of a vertex that is not reached from the source.
pub const UNREACHABLE: Level = Level::MAX;
