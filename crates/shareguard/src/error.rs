//! Error types for shareguard.
//!
//! This module defines the crate-level error type. Components that talk to
//! platform collaborators (documents, capture providers) have their own
//! narrower error enums which convert into [`Error`] where they cross the
//! public API.

use std::path::PathBuf;
use thiserror::Error;

use crate::dom::DomError;

/// The main error type for shareguard operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// A user-defined pattern could not be compiled.
    #[error("invalid custom pattern '{name}': {source}")]
    InvalidPattern {
        /// Name the user gave the pattern.
        name: String,
        /// The underlying regex error.
        #[source]
        source: regex::Error,
    },

    // === Document Errors ===
    /// A document operation failed.
    #[error("document error: {0}")]
    Dom(#[from] DomError),

    /// Failed to read a document snapshot.
    #[error("failed to read document {path}: {source}")]
    DocumentRead {
        /// Path of the snapshot.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Surface Errors ===
    /// The surface task has shut down and no longer accepts commands.
    #[error("surface is closed")]
    SurfaceClosed,

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for shareguard operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a configuration validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            message: message.into(),
        }
    }

    /// Check if this error was raised while validating user configuration.
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigLoad(_) | Self::ConfigValidation { .. } | Self::InvalidPattern { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ElementId;

    #[test]
    fn test_error_display() {
        let err = Error::SurfaceClosed;
        assert_eq!(err.to_string(), "surface is closed");
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_validation_error_display() {
        let err = Error::validation("debounce_ms must be greater than 0");
        assert!(err.to_string().contains("debounce_ms"));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_invalid_pattern_display() {
        let source = regex::Regex::new("[unclosed").unwrap_err();
        let err = Error::InvalidPattern {
            name: "Ticket".to_string(),
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("Ticket"));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_from_dom_error() {
        let err: Error = DomError::UnknownElement(ElementId::new(7)).into();
        assert!(matches!(err, Error::Dom(_)));
        assert!(!err.is_config_error());
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_document_read_error_display() {
        let err = Error::DocumentRead {
            path: PathBuf::from("/tmp/page.html"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/tmp/page.html"));
    }
}
