//! Error types for xslcheck
//!
//! This module defines all error types used throughout the library.
//! Errors distinguish malformed input, schema defects, and transducer
//! construction failures; semantic findings (type mismatches, validity
//! gaps) are reported in result values, not through this type.

use std::fmt;
use thiserror::Error;

/// Result type alias using xslcheck Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for xslcheck operations
#[derive(Error, Debug)]
pub enum Error {
    /// Non-parseable XML in one of the three inputs
    #[error("XML error: {0}")]
    Xml(String),

    /// Schema defect that does not admit a safe default
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    /// MTT construction failure (ambiguous or malformed stylesheet)
    #[error("transducer error: {0}")]
    Transducer(String),

    /// Input exceeds a configured limit
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// I/O error (CLI file reads)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Schema defect with context
///
/// Carries the element or type name that caused the defect and, when
/// available, a human-readable location inside the schema document.
#[derive(Debug, Clone)]
pub struct SchemaError {
    /// Error message
    pub message: String,
    /// Name of the offending element or type
    pub component: Option<String>,
    /// Location inside the schema document
    pub location: Option<String>,
}

impl SchemaError {
    /// Create a new schema error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            component: None,
            location: None,
        }
    }

    /// Set the offending component name
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Set the location
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(ref component) = self.component {
            write!(f, " (component: {})", component)?;
        }

        if let Some(ref location) = self.location {
            write!(f, " at {}", location)?;
        }

        Ok(())
    }
}

impl std::error::Error for SchemaError {}
