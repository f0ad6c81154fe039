//! # Graph Primitives
//!
//! Compiled-in constants for the wait-for graph.
//!
//! These are defaults and hard limits; runtime tuning goes through
//! [`GraphConfig`](crate::GraphConfig).

/// Terminator word of a segment in the subgraph encoding.
///
/// A segment is `source, target*, SEGMENT_TERMINATOR`. Because of this the
/// value can never be a transaction identifier.
pub const SEGMENT_TERMINATOR: u64 = 0;

/// Default number of hash buckets in the vertex index.
pub const DEFAULT_BUCKET_COUNT: usize = 1024;

/// Largest accepted bucket count.
///
/// The bucket table is allocated up front, so this bounds the memory a
/// configuration file can demand before the first vertex exists.
pub const MAX_BUCKET_COUNT: usize = 1 << 24;

/// Default maximum length, in words, of one encoded subgraph.
///
/// Bounds the work a single replace call can do. 1M words is far beyond
/// the local wait-for graph of any single node.
pub const DEFAULT_MAX_SUBGRAPH_WORDS: usize = 1 << 20;

/// Maximum number of records a pool can address.
///
/// Handles are `u32` indexes; the last value is kept out of range.
pub const MAX_POOL_RECORDS: usize = u32::MAX as usize;
