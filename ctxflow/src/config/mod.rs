//! Agent configuration.
//!
//! Configuration is read from JSON. Every section has defaults, so an empty
//! object is a valid configuration.

use crate::errors::ConfigError;
use crate::observability::LoggingConfig;
use crate::policy::PropagationConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Top-level configuration of the context engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Per-key propagation settings.
    #[serde(default)]
    pub propagation: PropagationConfig,
    /// Attributes seeded into every root context.
    #[serde(default)]
    pub common_tags: HashMap<String, String>,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AgentConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a configuration from JSON text.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads a configuration from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Adds a common tag.
    #[must_use]
    pub fn with_common_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.common_tags.insert(key.into(), value.into());
        self
    }

    /// Sets the propagation settings.
    #[must_use]
    pub fn with_propagation(mut self, propagation: PropagationConfig) -> Self {
        self.propagation = propagation;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PropagationPolicy;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "propagation": {
            "keys": {
                "tenant": {"down": true, "up": true, "down_global": true},
                "sql": {"tag": false}
            }
        },
        "common_tags": {"service": "checkout"},
        "logging": {"level": "debug", "json": true}
    }"#;

    #[test]
    fn test_empty_object_uses_defaults() {
        let config = AgentConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AgentConfig::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_sample() {
        let config = AgentConfig::from_json_str(SAMPLE).unwrap();
        let table = config.propagation.build();

        assert!(table.is_propagated_down_globally("tenant"));
        assert!(!table.is_tag("sql"));
        assert_eq!(config.common_tags.get("service").map(String::as_str), Some("checkout"));
        assert!(config.logging.json);
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AgentConfig::from_file(file.path()).unwrap();

        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = AgentConfig::from_file("/nonexistent/ctxflow.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        let err = AgentConfig::from_json_str("{\"common_tags\": 3}").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
