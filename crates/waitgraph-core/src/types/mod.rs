//! # Core Type Definitions
//!
//! This module contains the identifiers and error type shared by every
//! component of the wait-for graph:
//! - Transaction and reporter identifiers (`TransactionId`, `ReporterId`)
//! - Edge snapshot and replace outcome records (`WaitEdge`, `ReplaceSummary`)
//! - Error types (`WaitGraphError`)
//!
//! ## Identifier Guarantees
//!
//! `TransactionId` is backed by `NonZeroU64`: the value 0 is the segment
//! terminator of the subgraph encoding and can never name a vertex.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU64;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a transaction in the global wait-for graph.
///
/// Opaque to the graph; allocated by the transport layer. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId(NonZeroU64);

impl TransactionId {
    /// Create a transaction identifier. Returns `None` for the reserved value 0.
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Get the raw identifier value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle of a registered reporter (one cluster node or local lock manager).
///
/// Handles are allocated in increasing order and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReporterId(pub u32);

impl fmt::Display for ReporterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reporter#{}", self.0)
    }
}

// =============================================================================
// SNAPSHOT RECORDS
// =============================================================================

/// One wait-for edge as seen from outside the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WaitEdge {
    /// The reporter whose current generation contains this edge.
    pub reporter: ReporterId,
    /// The waiting transaction.
    pub source: TransactionId,
    /// The transaction being waited on.
    pub target: TransactionId,
}

/// Outcome of a single subgraph replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReplaceSummary {
    /// Edges installed as the reporter's new generation.
    pub installed: usize,
    /// Edges of the previous generation that were retired.
    pub retired: usize,
    /// Vertices returned to the pool because they became isolated.
    pub vertices_released: usize,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the waitgraph system.
///
/// - No silent failures
/// - Every failing graph operation leaves the graph untouched
/// - Unknown transactions on query are not errors (they simply have no cycle)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WaitGraphError {
    /// The segment encoding could not be parsed.
    #[error("Malformed subgraph at word {offset}: {reason}")]
    MalformedSubgraph {
        /// Index of the offending word in the encoded input.
        offset: usize,
        /// What was wrong with it.
        reason: &'static str,
    },

    /// The encoded subgraph exceeds the configured size limit.
    #[error("Subgraph of {words} words exceeds maximum of {max}")]
    SubgraphTooLarge {
        /// Length of the submitted encoding.
        words: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The reporter handle is not (or no longer) registered.
    #[error("Unknown reporter: {0}")]
    UnknownReporter(ReporterId),

    /// A record pool cannot grow any further.
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(&'static str),

    /// An internal consistency check failed.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An I/O error occurred in the application layer.
    #[error("I/O error: {0}")]
    IoError(String),
}

// =============================================================================
// TESTS
// =============================================================================
