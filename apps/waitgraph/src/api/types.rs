//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use serde::{Deserialize, Serialize};
use waitgraph_core::{GraphStats, ReplaceSummary, ReporterId, TransactionId, WaitEdge};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Graph status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub vertex_count: usize,
    pub edge_count: usize,
    pub reporter_count: usize,
    pub free_vertices: usize,
    pub free_edges: usize,
    pub bucket_count: usize,
    pub longest_chain: usize,
    pub epoch: u64,
}

impl From<GraphStats> for StatusResponse {
    fn from(stats: GraphStats) -> Self {
        Self {
            vertex_count: stats.vertex_count,
            edge_count: stats.edge_count,
            reporter_count: stats.reporter_count,
            free_vertices: stats.free_vertices,
            free_edges: stats.free_edges,
            bucket_count: stats.bucket_count,
            longest_chain: stats.longest_chain,
            epoch: stats.epoch,
        }
    }
}

// =============================================================================
// REPORTER RESPONSES
// =============================================================================

/// Response to `POST /reporters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub reporter_id: Option<u32>,
    pub error: Option<String>,
}

impl RegisterResponse {
    pub fn success(id: ReporterId) -> Self {
        Self {
            success: true,
            reporter_id: Some(id.0),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            reporter_id: None,
            error: Some(msg.into()),
        }
    }
}

/// Response to `DELETE /reporters/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnregisterResponse {
    pub success: bool,
    pub retired: usize,
    pub error: Option<String>,
}

impl UnregisterResponse {
    pub fn success(summary: ReplaceSummary) -> Self {
        Self {
            success: true,
            retired: summary.retired,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            retired: 0,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// SUBGRAPH REQUEST/RESPONSE
// =============================================================================

/// Subgraph submission: the flat segment encoding `source target* 0 ...`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgraphRequest {
    pub edges: Vec<u64>,
}

/// Response to a subgraph replacement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceResponse {
    pub success: bool,
    pub installed: usize,
    pub retired: usize,
    pub vertices_released: usize,
    pub error: Option<String>,
}

impl ReplaceResponse {
    pub fn success(summary: ReplaceSummary) -> Self {
        Self {
            success: true,
            installed: summary.installed,
            retired: summary.retired,
            vertices_released: summary.vertices_released,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            installed: 0,
            retired: 0,
            vertices_released: 0,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// DEADLOCK CHECK
// =============================================================================

/// Replace-then-check request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRequest {
    pub edges: Vec<u64>,
    pub xid: u64,
}

/// Deadlock verdict for one transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadlockResponse {
    pub success: bool,
    pub xid: u64,
    pub deadlock: bool,
    /// Members of the cycle, starting at `xid`.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub cycle: Option<Vec<u64>>,
    pub error: Option<String>,
}

impl DeadlockResponse {
    pub fn verdict(xid: TransactionId, cycle: Option<Vec<TransactionId>>) -> Self {
        Self {
            success: true,
            xid: xid.get(),
            deadlock: cycle.is_some(),
            cycle: cycle.map(|members| members.iter().map(|m| m.get()).collect()),
            error: None,
        }
    }

    pub fn error(xid: u64, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            xid,
            deadlock: false,
            cycle: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// GRAPH SNAPSHOT
// =============================================================================

/// Edge JSON representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeJson {
    pub reporter: u32,
    pub from: u64,
    pub to: u64,
}

impl From<WaitEdge> for EdgeJson {
    fn from(edge: WaitEdge) -> Self {
        Self {
            reporter: edge.reporter.0,
            from: edge.source.get(),
            to: edge.target.get(),
        }
    }
}

/// Full graph snapshot in sorted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphResponse {
    pub vertices: Vec<u64>,
    pub edges: Vec<EdgeJson>,
}
