//! # Graph Store
//!
//! Owns every vertex and edge of the global wait-for graph and implements
//! the subgraph replacement protocol.
//!
//! The graph is always the union of the latest generation of every
//! registered reporter. A reporter never edits its edges one by one; it
//! resubmits its whole local view and [`WaitGraph::replace_subgraph`] swaps
//! the old generation for the new one.
//!
//! ## Exclusive access
//!
//! There is no internal locking. Every operation that reads or writes graph
//! state, including the cycle query (which stamps vertices), takes
//! `&mut self`. To share a graph between threads or tasks wrap it in a mutex
//! and hold the guard across each whole call.

use crate::index::VertexIndex;
use crate::pool::{Handle, Pool};
use crate::primitives::{DEFAULT_BUCKET_COUNT, DEFAULT_MAX_SUBGRAPH_WORDS, MAX_BUCKET_COUNT};
use crate::registry::ReporterRegistry;
use crate::segment::Subgraph;
use crate::{ReplaceSummary, ReporterId, TransactionId, WaitEdge, WaitGraphError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Handle of a vertex record.
pub type VertexHandle = Handle<Vertex>;

/// Handle of an edge record.
pub type EdgeHandle = Handle<Edge>;

// =============================================================================
// RECORDS
// =============================================================================

/// One transaction in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vertex {
    pub(crate) xid: TransactionId,
    pub(crate) incoming: u32,
    /// Head of the outgoing list; newest edge first.
    pub(crate) first_out: Option<EdgeHandle>,
    /// Epoch of the last cycle query that reached this vertex.
    pub(crate) visited: u64,
    pub(crate) next_in_bucket: Option<VertexHandle>,
}

impl Vertex {
    pub(crate) const fn new(xid: TransactionId, next_in_bucket: Option<VertexHandle>) -> Self {
        Self {
            xid,
            incoming: 0,
            first_out: None,
            visited: 0,
            next_in_bucket,
        }
    }

    /// The transaction this vertex represents.
    #[must_use]
    pub fn xid(&self) -> TransactionId {
        self.xid
    }

    /// Number of edges pointing at this vertex.
    #[must_use]
    pub fn incoming(&self) -> u32 {
        self.incoming
    }

    fn is_isolated(&self) -> bool {
        self.incoming == 0 && self.first_out.is_none()
    }
}

/// A directed wait-for edge `source -> target`.
///
/// Linked into two lists at once: the source's outgoing list (doubly linked,
/// for O(1) unlink) and the owning reporter's generation (singly linked).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub(crate) source: VertexHandle,
    pub(crate) target: VertexHandle,
    pub(crate) reporter: ReporterId,
    pub(crate) prev_out: Option<EdgeHandle>,
    pub(crate) next_out: Option<EdgeHandle>,
    pub(crate) next_in_generation: Option<EdgeHandle>,
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Tuning knobs for a [`WaitGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraphConfig {
    /// Number of hash buckets in the vertex index.
    pub bucket_count: usize,
    /// Longest accepted subgraph encoding, in words.
    pub max_subgraph_words: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            bucket_count: DEFAULT_BUCKET_COUNT,
            max_subgraph_words: DEFAULT_MAX_SUBGRAPH_WORDS,
        }
    }
}

impl GraphConfig {
    /// Check that every limit is usable.
    pub fn validate(&self) -> Result<(), WaitGraphError> {
        if self.bucket_count == 0 {
            return Err(WaitGraphError::ConfigError(
                "bucket_count must be at least 1".to_string(),
            ));
        }
        if self.bucket_count > MAX_BUCKET_COUNT {
            return Err(WaitGraphError::ConfigError(format!(
                "bucket_count {} exceeds maximum {}",
                self.bucket_count, MAX_BUCKET_COUNT
            )));
        }
        if self.max_subgraph_words == 0 {
            return Err(WaitGraphError::ConfigError(
                "max_subgraph_words must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// STATS
// =============================================================================

/// Point-in-time counters of a [`WaitGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub vertex_count: usize,
    pub edge_count: usize,
    pub reporter_count: usize,
    pub free_vertices: usize,
    pub free_edges: usize,
    pub bucket_count: usize,
    pub longest_chain: usize,
    pub epoch: u64,
}

// =============================================================================
// WAIT GRAPH
// =============================================================================

/// The global wait-for graph.
#[derive(Debug, Clone)]
pub struct WaitGraph {
    pub(crate) vertices: Pool<Vertex>,
    pub(crate) edges: Pool<Edge>,
    pub(crate) index: VertexIndex,
    pub(crate) reporters: ReporterRegistry,
    pub(crate) epoch: u64,
    pub(crate) dfs_stack: Vec<crate::detector::DfsFrame>,
    config: GraphConfig,
}

impl Default for WaitGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitGraph {
    /// Create an empty graph with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(GraphConfig::default())
    }

    /// Create an empty graph with the given configuration.
    pub fn with_config(config: GraphConfig) -> Result<Self, WaitGraphError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: GraphConfig) -> Self {
        Self {
            vertices: Pool::new("vertices"),
            edges: Pool::new("edges"),
            index: VertexIndex::new(config.bucket_count),
            reporters: ReporterRegistry::new(),
            epoch: 0,
            dfs_stack: Vec::new(),
            config,
        }
    }

    /// The configuration this graph was built with.
    #[must_use]
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Reporter lifecycle
    // -------------------------------------------------------------------------

    /// Register a new reporter with an empty generation.
    pub fn register_reporter(&mut self) -> Result<ReporterId, WaitGraphError> {
        self.reporters.register()
    }

    /// Retire a reporter's generation and forget the reporter.
    ///
    /// Equivalent to replacing its subgraph with the empty set and then
    /// dropping its record.
    pub fn unregister_reporter(&mut self, reporter: ReporterId) -> Result<ReplaceSummary, WaitGraphError> {
        let previous = self.reporters.remove(reporter)?;
        let (retired, vertices_released) = self.retire_generation(previous.head);
        Ok(ReplaceSummary {
            installed: 0,
            retired,
            vertices_released,
        })
    }

    // -------------------------------------------------------------------------
    // Replacement protocol
    // -------------------------------------------------------------------------

    /// Replace everything `reporter` contributed with the edges in `encoded`.
    ///
    /// `encoded` uses the segment encoding (see [`crate::segment`]). The
    /// input is fully validated and pool capacity reserved before anything
    /// is modified; on error the graph is unchanged.
    ///
    /// New edges are installed before the previous generation is retired,
    /// so a vertex referenced by both generations is never recycled in
    /// between.
    pub fn replace_subgraph(
        &mut self,
        reporter: ReporterId,
        encoded: &[u64],
    ) -> Result<ReplaceSummary, WaitGraphError> {
        let subgraph = Subgraph::parse(encoded, self.config.max_subgraph_words)?;
        let current = *self.reporters.generation(reporter)?;
        self.vertices.reserve(subgraph.vertex_bound())?;
        self.edges.reserve(subgraph.edge_count())?;

        // Install the new generation
        let mut pending: Option<EdgeHandle> = None;
        for segment in subgraph.segments() {
            let source = self.index.find_or_insert(&mut self.vertices, segment.source());
            for target in segment.targets() {
                let target = self.index.find_or_insert(&mut self.vertices, target);
                pending = Some(self.link_edge(reporter, source, target, pending));
            }
            // A source with an empty run and no other edges was only just
            // created; drop it again.
            self.release_if_isolated(source);
        }

        // Retire the old one
        let (retired, vertices_released) = self.retire_generation(current.head);

        self.reporters
            .install(reporter, current.succeed(pending, subgraph.edge_count()));

        Ok(ReplaceSummary {
            installed: subgraph.edge_count(),
            retired,
            vertices_released,
        })
    }

    fn link_edge(
        &mut self,
        reporter: ReporterId,
        source: VertexHandle,
        target: VertexHandle,
        next_in_generation: Option<EdgeHandle>,
    ) -> EdgeHandle {
        let first = self.vertices.get(source).first_out;
        let edge = self.edges.acquire(Edge {
            source,
            target,
            reporter,
            prev_out: None,
            next_out: first,
            next_in_generation,
        });
        if let Some(first) = first {
            self.edges.get_mut(first).prev_out = Some(edge);
        }
        self.vertices.get_mut(source).first_out = Some(edge);
        self.vertices.get_mut(target).incoming += 1;
        edge
    }

    fn unlink_edge(&mut self, edge: EdgeHandle) {
        let Edge {
            source,
            prev_out,
            next_out,
            ..
        } = *self.edges.get(edge);

        match prev_out {
            Some(prev) => self.edges.get_mut(prev).next_out = next_out,
            None => self.vertices.get_mut(source).first_out = next_out,
        }
        if let Some(next) = next_out {
            self.edges.get_mut(next).prev_out = prev_out;
        }
    }

    /// Unlink and release every edge of a generation list.
    ///
    /// Returns `(edges retired, vertices released)`.
    fn retire_generation(&mut self, head: Option<EdgeHandle>) -> (usize, usize) {
        let mut retired = 0;
        let mut released = 0;
        let mut cursor = head;

        while let Some(edge) = cursor {
            let record = *self.edges.get(edge);
            cursor = record.next_in_generation;

            self.unlink_edge(edge);
            let target = self.vertices.get_mut(record.target);
            target.incoming = target.incoming.saturating_sub(1);

            if self.release_if_isolated(record.target) {
                released += 1;
            }
            // A self-wait has one vertex for both endpoints; it may already be gone.
            if record.source != record.target && self.release_if_isolated(record.source) {
                released += 1;
            }

            self.edges.release(edge);
            retired += 1;
        }

        (retired, released)
    }

    fn release_if_isolated(&mut self, vertex: VertexHandle) -> bool {
        if self.vertices.get(vertex).is_isolated() {
            self.index.remove(&mut self.vertices, vertex);
            true
        } else {
            false
        }
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------

    /// Whether `xid` currently has a vertex.
    #[must_use]
    pub fn contains(&self, xid: TransactionId) -> bool {
        self.index.find(&self.vertices, xid).is_some()
    }

    /// Number of edges pointing at `xid`, or `None` if it has no vertex.
    #[must_use]
    pub fn incoming_count(&self, xid: TransactionId) -> Option<u32> {
        self.index
            .find(&self.vertices, xid)
            .map(|v| self.vertices.get(v).incoming)
    }

    /// Transactions `xid` waits for, newest edge first.
    ///
    /// Parallel edges from different reporters appear once per edge.
    #[must_use]
    pub fn successors(&self, xid: TransactionId) -> Vec<TransactionId> {
        let mut result = Vec::new();
        let Some(vertex) = self.index.find(&self.vertices, xid) else {
            return result;
        };
        let mut cursor = self.vertices.get(vertex).first_out;
        while let Some(edge) = cursor {
            let record = self.edges.get(edge);
            result.push(self.vertices.get(record.target).xid);
            cursor = record.next_out;
        }
        result
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.index.len()
    }

    /// Number of edges across all reporters.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.live_count()
    }

    /// Number of registered reporters.
    #[must_use]
    pub fn reporter_count(&self) -> usize {
        self.reporters.len()
    }

    /// Registered reporters in id order.
    #[must_use]
    pub fn reporter_ids(&self) -> Vec<ReporterId> {
        self.reporters.iter().map(|(id, _)| id).collect()
    }

    /// Size of a reporter's current generation.
    pub fn reporter_edge_count(&self, reporter: ReporterId) -> Result<usize, WaitGraphError> {
        Ok(self.reporters.generation(reporter)?.edge_count())
    }

    /// Number of subgraphs a reporter has submitted.
    pub fn reporter_submissions(&self, reporter: ReporterId) -> Result<u64, WaitGraphError> {
        Ok(self.reporters.generation(reporter)?.submissions())
    }

    /// All edges, sorted by (reporter, source, target).
    #[must_use]
    pub fn edges(&self) -> Vec<WaitEdge> {
        let mut edges: Vec<WaitEdge> = self
            .edges
            .iter()
            .map(|(_, edge)| WaitEdge {
                reporter: edge.reporter,
                source: self.vertices.get(edge.source).xid,
                target: self.vertices.get(edge.target).xid,
            })
            .collect();
        edges.sort_unstable();
        edges
    }

    /// All transactions that have a vertex, sorted.
    #[must_use]
    pub fn vertex_ids(&self) -> Vec<TransactionId> {
        let mut ids: Vec<TransactionId> = self.vertices.iter().map(|(_, v)| v.xid).collect();
        ids.sort_unstable();
        ids
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            vertex_count: self.vertex_count(),
            edge_count: self.edge_count(),
            reporter_count: self.reporter_count(),
            free_vertices: self.vertices.free_count(),
            free_edges: self.edges.free_count(),
            bucket_count: self.index.bucket_count(),
            longest_chain: self.index.longest_chain(&self.vertices),
            epoch: self.epoch,
        }
    }

    /// Verify the structural invariants of the graph.
    ///
    /// Checks that every vertex is indexed and has an incident edge, that
    /// incoming counts match the edges, that outgoing lists are consistently
    /// linked, and that every edge sits in exactly one reporter generation.
    pub fn check_invariants(&self) -> Result<(), WaitGraphError> {
        let violation = |msg: String| Err(WaitGraphError::InvariantViolation(msg));

        if self.index.len() != self.vertices.live_count() {
            return violation(format!(
                "index holds {} vertices but pool has {} live",
                self.index.len(),
                self.vertices.live_count()
            ));
        }

        let mut incoming: BTreeMap<u32, u32> = BTreeMap::new();
        let mut outgoing_total = 0usize;

        for (handle, vertex) in self.vertices.iter() {
            if self.index.find(&self.vertices, vertex.xid) != Some(handle) {
                return violation(format!("vertex {} is not reachable from the index", vertex.xid));
            }
            if vertex.is_isolated() {
                return violation(format!("vertex {} has no incident edge", vertex.xid));
            }

            let mut prev = None;
            let mut cursor = vertex.first_out;
            while let Some(edge) = cursor {
                if !self.edges.is_live(edge) {
                    return violation(format!("vertex {} links a released edge", vertex.xid));
                }
                let record = self.edges.get(edge);
                if record.source != handle || record.prev_out != prev {
                    return violation(format!("outgoing list of {} is mislinked", vertex.xid));
                }
                *incoming.entry(record.target.index()).or_default() += 1;
                outgoing_total += 1;
                prev = Some(edge);
                cursor = record.next_out;
            }
        }

        if outgoing_total != self.edges.live_count() {
            return violation(format!(
                "{} edges reachable from vertices, {} live",
                outgoing_total,
                self.edges.live_count()
            ));
        }

        for (handle, vertex) in self.vertices.iter() {
            let counted = incoming.get(&handle.index()).copied().unwrap_or(0);
            if counted != vertex.incoming {
                return violation(format!(
                    "vertex {} records {} incoming edges, found {}",
                    vertex.xid, vertex.incoming, counted
                ));
            }
        }

        let mut owned: BTreeSet<u32> = BTreeSet::new();
        for (reporter, generation) in self.reporters.iter() {
            let mut length = 0usize;
            let mut cursor = generation.head;
            while let Some(edge) = cursor {
                if !self.edges.is_live(edge) {
                    return violation(format!("{} owns a released edge", reporter));
                }
                if !owned.insert(edge.index()) {
                    return violation(format!("edge {:?} is in two generations", edge));
                }
                let record = self.edges.get(edge);
                if record.reporter != reporter {
                    return violation(format!("{} holds an edge tagged {}", reporter, record.reporter));
                }
                length += 1;
                cursor = record.next_in_generation;
            }
            if length != generation.edge_count() {
                return violation(format!(
                    "{} records {} edges, list has {}",
                    reporter,
                    generation.edge_count(),
                    length
                ));
            }
        }

        if owned.len() != self.edges.live_count() {
            return violation(format!(
                "{} live edges but only {} owned by a generation",
                self.edges.live_count(),
                owned.len()
            ));
        }

        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
