//! # Daemon Configuration
//!
//! Configuration is read from an optional TOML file and then overridden by
//! CLI flags. Every field has a default, so an empty file (or no file at
//! all) is a valid configuration.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 5431
//! max_body_bytes = 4194304
//!
//! [graph]
//! bucket_count = 4096
//! max_subgraph_words = 1048576
//! ```
//!
//! Security settings stay in the environment (`WAITGRAPH_API_KEY`,
//! `WAITGRAPH_RATE_LIMIT`, `WAITGRAPH_CORS_ORIGINS`) so secrets never end up
//! in a config file.

use serde::{Deserialize, Serialize};
use std::path::Path;
use waitgraph_core::{GraphConfig, WaitGraphError};

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5431,
            max_body_bytes: 4 * 1024 * 1024,
        }
    }
}

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub graph: GraphConfig,
}

impl DaemonConfig {
    /// Load from `path`, or return defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, WaitGraphError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let metadata = std::fs::metadata(path).map_err(|e| {
            WaitGraphError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(WaitGraphError::ConfigError(format!(
                "Config file {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            WaitGraphError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, WaitGraphError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| WaitGraphError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render as TOML.
    pub fn to_toml_string(&self) -> Result<String, WaitGraphError> {
        toml::to_string(self).map_err(|e| WaitGraphError::ConfigError(e.to_string()))
    }

    /// Apply CLI overrides on top of the loaded values.
    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.server.host = host;
        }
        if let Some(port) = port {
            self.server.port = port;
        }
    }

    /// Check every section.
    pub fn validate(&self) -> Result<(), WaitGraphError> {
        if self.server.host.trim().is_empty() {
            return Err(WaitGraphError::ConfigError(
                "server.host must not be empty".to_string(),
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(WaitGraphError::ConfigError(
                "server.max_body_bytes must be at least 1".to_string(),
            ));
        }
        self.graph.validate()
    }

    /// `host:port` for the listener.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = DaemonConfig::from_toml_str("").expect("parse");
        assert_eq!(config, DaemonConfig::default());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config = DaemonConfig::from_toml_str("[graph]\nbucket_count = 64\n").expect("parse");
        assert_eq!(config.graph.bucket_count, 64);
        assert_eq!(
            config.graph.max_subgraph_words,
            GraphConfig::default().max_subgraph_words
        );
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = DaemonConfig::from_toml_str("[server]\nhots = \"x\"\n").expect_err("typo");
        assert!(matches!(err, WaitGraphError::ConfigError(_)));
    }

    #[test]
    fn unknown_graph_keys_are_rejected() {
        let err = DaemonConfig::from_toml_str("[graph]\nbucket_cout = 4\n").expect_err("typo");
        assert!(matches!(err, WaitGraphError::ConfigError(_)));
    }

    #[test]
    fn oversized_bucket_table_fails_validation() {
        let err = DaemonConfig::from_toml_str("[graph]\nbucket_count = 4611686018427387904\n")
            .expect_err("too many buckets");
        assert!(matches!(err, WaitGraphError::ConfigError(_)));
    }

    #[test]
    fn zero_buckets_fail_validation() {
        let err = DaemonConfig::from_toml_str("[graph]\nbucket_count = 0\n").expect_err("invalid");
        assert!(matches!(err, WaitGraphError::ConfigError(_)));
    }

    #[test]
    fn overrides_win() {
        let mut config = DaemonConfig::default();
        config.apply_overrides(Some("0.0.0.0".to_string()), Some(9000));
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");

        config.apply_overrides(None, None);
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
    }

    #[test]
    fn toml_output_parses_back() {
        let mut config = DaemonConfig::default();
        config.graph.bucket_count = 128;
        let text = config.to_toml_string().expect("render");
        assert_eq!(DaemonConfig::from_toml_str(&text).expect("parse"), config);
    }
}
