//! # waitgraph-core
//!
//! The global wait-for graph and deadlock detector - THE GRAPH.
//!
//! Reporters (cluster nodes, local lock managers) each submit the wait-for
//! edges they currently observe. The graph keeps the union of the latest
//! submission of every reporter and answers, on demand, whether a
//! transaction sits on a cycle of that union, i.e. is deadlocked.
//!
//! ```
//! use waitgraph_core::{TransactionId, WaitGraph};
//!
//! let t = |raw| TransactionId::new(raw).expect("non-zero");
//! let mut graph = WaitGraph::new();
//! let node_a = graph.register_reporter()?;
//! let node_b = graph.register_reporter()?;
//!
//! // node A: 1 waits for 2, 2 waits for 3
//! graph.replace_subgraph(node_a, &[1, 2, 0, 2, 3, 0])?;
//! assert!(!graph.has_cycle(t(1)));
//!
//! // node B: 3 waits for 1
//! graph.replace_subgraph(node_b, &[3, 1, 0])?;
//! assert!(graph.has_cycle(t(1)));
//! # Ok::<(), waitgraph_core::WaitGraphError>(())
//! ```
//!
//! ## Architectural Constraints
//!
//! - No async, no network, no persistence
//! - No internal locking: every operation takes `&mut self`; callers that
//!   share a graph serialise access with their own mutex
//! - Vertex and edge records live in pools and are recycled
//! - Failing operations leave the graph unchanged

// =============================================================================
// MODULES
// =============================================================================

pub mod detector;
pub mod graph;
pub mod index;
pub mod pool;
pub mod primitives;
pub mod registry;
pub mod segment;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{ReplaceSummary, ReporterId, TransactionId, WaitEdge, WaitGraphError};

// =============================================================================
// RE-EXPORTS: Graph Store
// =============================================================================

pub use graph::{GraphConfig, GraphStats, WaitGraph};
pub use registry::{Generation, ReporterRegistry};
pub use segment::{Segment, Subgraph, SubgraphBuilder, encode_edges};
