//! # waitgraph - Global Deadlock Detector
//!
//! The daemon binary. Every node of a cluster reports the wait-for edges it
//! observes locally; the daemon keeps the union and tells a node, before it
//! lets a transaction block, whether that wait would close a cycle.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               apps/waitgraph (THE DAEMON)        │
//! │                                                  │
//! │   ┌─────────────┐          ┌─────────────┐       │
//! │   │    CLI      │          │  HTTP API   │       │
//! │   │  (clap)     │          │   (axum)    │       │
//! │   └──────┬──────┘          └──────┬──────┘       │
//! │          └───────────┬────────────┘              │
//! │                      ▼                           │
//! │              ┌───────────────┐                   │
//! │              │ waitgraph-core│                   │
//! │              │  (THE GRAPH)  │                   │
//! │              └───────────────┘                   │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! waitgraph server --host 0.0.0.0 --port 5431
//!
//! # Replay a recorded scenario
//! waitgraph replay -f scenario.json
//!
//! # Show the effective configuration
//! waitgraph --config waitgraph.toml config
//! ```

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use waitgraph::cli;

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // WAITGRAPH_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("WAITGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "waitgraph=info,tower_http=debug".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        r#"
  waitgraph v{}
  global wait-for graph / deadlock detector
"#,
        env!("CARGO_PKG_VERSION")
    );
}
