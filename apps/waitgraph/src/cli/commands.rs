//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use crate::api;
use crate::config::DaemonConfig;
use crate::replay::{ReplayScript, StepOutcome, run_script};
use std::path::{Path, PathBuf};
use waitgraph_core::WaitGraphError;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for replay scripts (100 MB).
const MAX_SCRIPT_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), WaitGraphError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| WaitGraphError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(WaitGraphError::IoError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve `path` to a canonical regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, WaitGraphError> {
    let canonical = path.canonicalize().map_err(|e| {
        WaitGraphError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(WaitGraphError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &DaemonConfig) -> Result<(), WaitGraphError> {
    config.validate()?;

    println!("waitgraph deadlock detector starting...");
    println!();
    println!("Configuration:");
    println!("  Listen:       {}", config.bind_addr());
    println!("  Buckets:      {}", config.graph.bucket_count);
    println!("  Max subgraph: {} words", config.graph.max_subgraph_words);
    println!();
    println!("Endpoints:");
    println!("  POST   /reporters               - Register a reporter");
    println!("  DELETE /reporters/{{id}}          - Unregister a reporter");
    println!("  PUT    /reporters/{{id}}/subgraph - Replace a reporter's edges");
    println!("  POST   /reporters/{{id}}/check    - Replace, then check a transaction");
    println!("  GET    /deadlock/{{xid}}          - Check a transaction");
    println!("  GET    /graph                   - Graph snapshot");
    println!("  GET    /status                  - Graph counters");
    println!("  GET    /health                  - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(config).await
}

// =============================================================================
// REPLAY COMMAND
// =============================================================================

/// Load a script file.
pub fn load_script(path: &Path) -> Result<ReplayScript, WaitGraphError> {
    let canonical = validate_file_path(path)?;
    validate_file_size(&canonical, MAX_SCRIPT_FILE_SIZE)?;

    let contents = std::fs::read(&canonical)
        .map_err(|e| WaitGraphError::IoError(format!("Cannot read file: {}", e)))?;
    serde_json::from_slice(&contents)
        .map_err(|e| WaitGraphError::IoError(format!("Invalid replay script: {}", e)))
}

/// Replay a scenario script.
pub fn cmd_replay(
    config: &DaemonConfig,
    file: &Path,
    json_mode: bool,
    verbose: bool,
) -> Result<(), WaitGraphError> {
    let script = load_script(file)?;
    tracing::debug!(steps = script.steps.len(), "Loaded replay script {}", file.display());

    let outcomes = run_script(&script, config.graph)?;
    let deadlocks = outcomes
        .iter()
        .filter(|o| matches!(o, StepOutcome::Checked { deadlock: true, .. }))
        .count();
    let failures = outcomes
        .iter()
        .filter(|o| matches!(o, StepOutcome::Failed { .. }))
        .count();

    if json_mode {
        let output = serde_json::json!({
            "steps": outcomes.len(),
            "deadlocks": deadlocks,
            "failures": failures,
            "outcomes": outcomes,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Replay of {}", file.display());
    println!("==================");
    for (i, outcome) in outcomes.iter().enumerate() {
        let quiet_step = matches!(
            outcome,
            StepOutcome::Registered { .. } | StepOutcome::Submitted { .. }
        );
        if verbose || !quiet_step {
            println!("  [{:>4}] {}", i, outcome);
        }
    }
    println!();
    println!("Steps:     {}", outcomes.len());
    println!("Deadlocks: {}", deadlocks);
    println!("Failures:  {}", failures);

    Ok(())
}

// =============================================================================
// CONFIG COMMAND
// =============================================================================

/// Print the effective configuration.
pub fn cmd_config(config: &DaemonConfig, json_mode: bool) -> Result<(), WaitGraphError> {
    if json_mode {
        let output = serde_json::to_string_pretty(config)
            .map_err(|e| WaitGraphError::ConfigError(e.to_string()))?;
        println!("{}", output);
    } else {
        print!("{}", config.to_toml_string()?);
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_script_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            r#"{{"steps": [{{"op": "submit", "reporter": "a", "edges": [[1, 1]]}}, {{"op": "check", "xid": 1}}]}}"#
        )
        .expect("write");

        let script = load_script(file.path()).expect("load");
        assert_eq!(script.steps.len(), 2);
    }

    #[test]
    fn load_script_rejects_directories() {
        let dir = tempfile::tempdir().expect("temp dir");
        assert!(matches!(
            load_script(dir.path()),
            Err(WaitGraphError::IoError(_))
        ));
    }

    #[test]
    fn load_script_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(file, "not json").expect("write");
        assert!(load_script(file.path()).is_err());
    }
}
