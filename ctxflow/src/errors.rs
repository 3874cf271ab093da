//! Error types for the ctxflow library.
//!
//! Lifecycle misuse is reported through [`ContextError`] and never mutates
//! shared state. Header codec failures ([`CodecError`]) are per entry: they
//! are logged and skipped by the codec and only surface in its internals and
//! tests.

use crate::context::{ContextId, LifecyclePhase};
use thiserror::Error;

/// The main error type for ctxflow operations.
#[derive(Debug, Error)]
pub enum CtxflowError {
    /// A context lifecycle precondition was violated.
    #[error("{0}")]
    Context(#[from] ContextError),

    /// A header entry could not be encoded or decoded.
    #[error("{0}")]
    Codec(#[from] CodecError),

    /// Configuration could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

/// Errors raised when a context is used outside its lifecycle contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// The operation requires a different lifecycle phase.
    #[error("Context {id} is in phase {actual}, expected {expected}")]
    InvalidPhase {
        /// The context.
        id: ContextId,
        /// The phase the operation requires.
        expected: LifecyclePhase,
        /// The phase the context is in.
        actual: LifecyclePhase,
    },

    /// The context has already been closed.
    #[error("Context {id} is already closed")]
    Closed {
        /// The context.
        id: ContextId,
    },
}

impl ContextError {
    /// Creates an invalid phase error.
    #[must_use]
    pub fn invalid_phase(id: ContextId, expected: LifecyclePhase, actual: LifecyclePhase) -> Self {
        Self::InvalidPhase {
            id,
            expected,
            actual,
        }
    }
}

/// Errors for a single `Correlation-Context` entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The entry is not a single `key=value` assignment.
    #[error("Malformed entry '{entry}': expected exactly one '=' assignment")]
    MissingAssignment {
        /// The raw entry.
        entry: String,
    },

    /// The entry has an empty key.
    #[error("Malformed entry '{entry}': empty key")]
    EmptyKey {
        /// The raw entry.
        entry: String,
    },

    /// Percent-decoding produced invalid UTF-8.
    #[error("Invalid percent-encoding in '{text}'")]
    InvalidEncoding {
        /// The raw text.
        text: String,
    },

    /// The value does not parse as the type named by its `type` property.
    #[error("Value '{value}' is not a valid literal for type '{type_id}'")]
    InvalidValue {
        /// The decoded value.
        value: String,
        /// The wire type id.
        type_id: char,
    },

    /// The value type cannot travel in a header.
    #[error("Value for key '{key}' cannot be written to a header")]
    Unsupported {
        /// The key.
        key: String,
    },
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_phase_message() {
        let err = ContextError::invalid_phase(
            ContextId::from_raw(3),
            LifecyclePhase::Entry,
            LifecyclePhase::Active,
        );
        assert_eq!(err.to_string(), "Context #3 is in phase active, expected entry");
    }

    #[test]
    fn test_codec_error_converts_into_umbrella() {
        let err: CtxflowError = CodecError::MissingAssignment {
            entry: "junk".to_string(),
        }
        .into();
        assert!(matches!(err, CtxflowError::Codec(_)));
        assert!(err.to_string().contains("junk"));
    }

    #[test]
    fn test_config_parse_error() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ConfigError::from(parse);
        assert!(err.to_string().starts_with("Failed to parse configuration"));
    }
}
