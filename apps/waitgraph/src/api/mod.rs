//! # waitgraph HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Graph counters
//! - `POST /reporters` - Register a reporter
//! - `DELETE /reporters/{id}` - Unregister a reporter
//! - `PUT /reporters/{id}/subgraph` - Replace a reporter's subgraph
//! - `POST /reporters/{id}/check` - Replace, then check one transaction
//! - `GET /deadlock/{xid}` - Check one transaction
//! - `GET /graph` - Snapshot of all vertices and edges
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `WAITGRAPH_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `WAITGRAPH_RATE_LIMIT`: Requests per second for each reporter, and for the
//!   administrative routes together (default: 1000, 0 to disable). `/health`
//!   and `/deadlock/{xid}` are never limited.
//! - `WAITGRAPH_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::ApiKey;
pub use middleware::RateLimits;
pub use types::{
    CheckRequest, DeadlockResponse, EdgeJson, GraphResponse, HealthResponse, RegisterResponse,
    ReplaceResponse, StatusResponse, SubgraphRequest, UnregisterResponse,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use waitgraph_core::{WaitGraph, WaitGraphError};

use crate::config::DaemonConfig;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the graph.
#[derive(Clone)]
pub struct AppState {
    /// The one graph; every request holds the lock for its whole core call.
    pub graph: Arc<Mutex<WaitGraph>>,
    /// Largest accepted request body.
    pub body_limit: usize,
}

impl AppState {
    /// Create new app state around a graph.
    #[must_use]
    pub fn new(graph: WaitGraph, body_limit: usize) -> Self {
        Self {
            graph: Arc::new(Mutex::new(graph)),
            body_limit,
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const CORS_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Build CORS layer from `WAITGRAPH_CORS_ORIGINS`.
///
/// - `*`: allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("WAITGRAPH_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (WAITGRAPH_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in WAITGRAPH_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods(CORS_METHODS)
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No WAITGRAPH_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(CORS_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting (if enabled)
/// 5. Authentication (if configured)
pub fn create_router(state: AppState) -> Router {
    let rate_limits = RateLimits::from_env();
    if rate_limits.is_some() {
        tracing::info!("Per-reporter rate limiting enabled");
    } else {
        tracing::info!("Rate limiting disabled");
    }

    let api_key = ApiKey::from_env();
    if api_key.is_some() {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - any client can rewrite the wait-for graph! \
             Set WAITGRAPH_API_KEY environment variable to enable authentication."
        );
    }

    let body_limit = state.body_limit;

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/reporters", post(handlers::register_handler))
        .route("/reporters/{id}", delete(handlers::unregister_handler))
        .route("/reporters/{id}/subgraph", put(handlers::replace_handler))
        .route("/reporters/{id}/check", post(handlers::check_handler))
        .route("/deadlock/{xid}", get(handlers::deadlock_handler))
        .route("/graph", get(handlers::graph_handler));

    if let Some(key) = api_key {
        router = router.layer(axum_middleware::from_fn_with_state(
            key,
            auth::require_api_key,
        ));
    }

    if let Some(limits) = rate_limits {
        router = router.layer(axum_middleware::from_fn_with_state(
            limits,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer())
                .layer(axum::extract::DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server and run until Ctrl-C.
pub async fn run_server(config: &DaemonConfig) -> Result<(), WaitGraphError> {
    let graph = WaitGraph::with_config(config.graph)?;
    let state = AppState::new(graph, config.server.max_body_bytes);
    let router = create_router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| WaitGraphError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!(
        bucket_count = config.graph.bucket_count,
        max_subgraph_words = config.graph.max_subgraph_words,
        "waitgraph HTTP server listening on {}",
        addr
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| WaitGraphError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl-C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
