//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers. Every handler
//! holds the graph lock for the whole core call.

use super::{
    AppState,
    types::{
        CheckRequest, DeadlockResponse, EdgeJson, GraphResponse, HealthResponse,
        RegisterResponse, ReplaceResponse, StatusResponse, SubgraphRequest, UnregisterResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use waitgraph_core::{ReporterId, TransactionId, WaitGraphError};

/// Map a core error to the HTTP status reported to the client.
fn status_for(error: &WaitGraphError) -> StatusCode {
    match error {
        WaitGraphError::UnknownReporter(_) => StatusCode::NOT_FOUND,
        WaitGraphError::MalformedSubgraph { .. } | WaitGraphError::SubgraphTooLarge { .. } => {
            StatusCode::BAD_REQUEST
        }
        WaitGraphError::CapacityExceeded(_) => StatusCode::SERVICE_UNAVAILABLE,
        WaitGraphError::InvariantViolation(_)
        | WaitGraphError::ConfigError(_)
        | WaitGraphError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Get graph status.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let graph = state.graph.lock().await;
    (StatusCode::OK, Json(StatusResponse::from(graph.stats())))
}

// =============================================================================
// REPORTER HANDLERS
// =============================================================================

/// Register a new reporter.
pub async fn register_handler(State(state): State<AppState>) -> impl IntoResponse {
    let mut graph = state.graph.lock().await;
    match graph.register_reporter() {
        Ok(id) => {
            tracing::info!(event = "reporter_registered", reporter = id.0, "Registered {}", id);
            (StatusCode::OK, Json(RegisterResponse::success(id)))
        }
        Err(e) => (status_for(&e), Json(RegisterResponse::error(e.to_string()))),
    }
}

/// Retire a reporter's edges and forget it.
pub async fn unregister_handler(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> impl IntoResponse {
    let reporter = ReporterId(id);
    let mut graph = state.graph.lock().await;
    match graph.unregister_reporter(reporter) {
        Ok(summary) => {
            tracing::info!(
                event = "reporter_unregistered",
                reporter = id,
                retired = summary.retired,
                "Unregistered {}",
                reporter
            );
            (StatusCode::OK, Json(UnregisterResponse::success(summary)))
        }
        Err(e) => (status_for(&e), Json(UnregisterResponse::error(e.to_string()))),
    }
}

// =============================================================================
// SUBGRAPH HANDLER
// =============================================================================

/// Replace a reporter's subgraph.
pub async fn replace_handler(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<SubgraphRequest>,
) -> impl IntoResponse {
    let reporter = ReporterId(id);
    let mut graph = state.graph.lock().await;
    match graph.replace_subgraph(reporter, &request.edges) {
        Ok(summary) => {
            tracing::debug!(
                event = "subgraph_replaced",
                reporter = id,
                installed = summary.installed,
                retired = summary.retired,
                released = summary.vertices_released,
            );
            (StatusCode::OK, Json(ReplaceResponse::success(summary)))
        }
        Err(e) => {
            tracing::warn!(event = "subgraph_rejected", reporter = id, error = %e);
            (status_for(&e), Json(ReplaceResponse::error(e.to_string())))
        }
    }
}

// =============================================================================
// DEADLOCK HANDLERS
// =============================================================================

/// Replace a reporter's subgraph, then check one transaction.
pub async fn check_handler(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<CheckRequest>,
) -> impl IntoResponse {
    let Some(xid) = TransactionId::new(request.xid) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(DeadlockResponse::error(0, "Transaction id 0 is reserved")),
        );
    };

    let reporter = ReporterId(id);
    let mut graph = state.graph.lock().await;
    if let Err(e) = graph.replace_subgraph(reporter, &request.edges) {
        tracing::warn!(event = "subgraph_rejected", reporter = id, error = %e);
        return (
            status_for(&e),
            Json(DeadlockResponse::error(xid.get(), e.to_string())),
        );
    }

    let cycle = graph.find_cycle(xid);
    log_verdict(xid, cycle.as_deref());
    (StatusCode::OK, Json(DeadlockResponse::verdict(xid, cycle)))
}

/// Check one transaction against the current graph.
pub async fn deadlock_handler(
    State(state): State<AppState>,
    Path(raw): Path<u64>,
) -> impl IntoResponse {
    let Some(xid) = TransactionId::new(raw) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(DeadlockResponse::error(raw, "Transaction id 0 is reserved")),
        );
    };

    let mut graph = state.graph.lock().await;
    let cycle = graph.find_cycle(xid);
    log_verdict(xid, cycle.as_deref());
    (StatusCode::OK, Json(DeadlockResponse::verdict(xid, cycle)))
}

fn log_verdict(xid: TransactionId, cycle: Option<&[TransactionId]>) {
    if let Some(members) = cycle {
        tracing::warn!(
            event = "deadlock_detected",
            xid = xid.get(),
            cycle_len = members.len(),
            "Deadlock detected at {}",
            xid
        );
    }
}

// =============================================================================
// GRAPH SNAPSHOT HANDLER
// =============================================================================

/// Dump every vertex and edge.
pub async fn graph_handler(State(state): State<AppState>) -> impl IntoResponse {
    let graph = state.graph.lock().await;
    let response = GraphResponse {
        vertices: graph.vertex_ids().iter().map(|x| x.get()).collect(),
        edges: graph.edges().into_iter().map(EdgeJson::from).collect(),
    };
    (StatusCode::OK, Json(response))
}

// =============================================================================
// TESTS
// =============================================================================
