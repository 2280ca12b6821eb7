//! Error handling for the FraudWatch library
//!
//! This module provides a unified, categorized error system shared by the
//! telemetry layer, the scripted agents, and the workflow driver. Every error
//! carries a human-readable message plus a stable category string that the
//! instrumentation layer records as the `error.type` span attribute.
//!
//! # Error Categories
//!
//! - **Input Validation** - caller-provided data failed validation
//! - **Configuration** - endpoint, connection-string, or environment issues
//! - **Agent Errors** - an agent stage failed or returned unusable content
//! - **Workflow Errors** - pipeline-level failures outside a single agent
//! - **Telemetry Errors** - exporter or pipeline installation failures
//! - **Serialization** - JSON encode/decode failures
//!
//! # Quick Start
//!
//! ```rust
//! use fraudwatch::error::FraudWatchError;
//!
//! let error = FraudWatchError::agent_error("risk analyser returned no content");
//! assert_eq!(error.category(), "agent");
//! assert_eq!(error.to_string(), "Agent error: risk analyser returned no content");
//! ```

use thiserror::Error;

/// Main error type for the FraudWatch library
#[derive(Error, Debug, Clone)]
pub enum FraudWatchError {
    /// Input validation errors (caller-provided data is invalid)
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration errors (endpoints, connection strings, environment)
    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    /// An agent stage failed or produced unusable output
    #[error("Agent error: {message}")]
    AgentError { message: String },

    /// Workflow orchestration errors outside any single agent
    #[error("Workflow error: {message}")]
    WorkflowError { message: String },

    /// Telemetry pipeline installation or export failures
    #[error("Telemetry error: {message}")]
    TelemetryError { message: String },

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {message}")]
    SerializationError { message: String },
}

impl FraudWatchError {
    /// Create a simple InvalidInput error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a simple ConfigurationError
    pub fn configuration_error(message: impl Into<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a simple AgentError
    pub fn agent_error(message: impl Into<String>) -> Self {
        Self::AgentError {
            message: message.into(),
        }
    }

    /// Create a simple WorkflowError
    pub fn workflow_error(message: impl Into<String>) -> Self {
        Self::WorkflowError {
            message: message.into(),
        }
    }

    /// Create a simple TelemetryError
    pub fn telemetry_error(message: impl Into<String>) -> Self {
        Self::TelemetryError {
            message: message.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }

    /// Stable category string, recorded as the `error.type` span attribute
    pub fn category(&self) -> &'static str {
        match self {
            FraudWatchError::InvalidInput { .. } => "invalid_input",
            FraudWatchError::ConfigurationError { .. } => "configuration",
            FraudWatchError::AgentError { .. } => "agent",
            FraudWatchError::WorkflowError { .. } => "workflow",
            FraudWatchError::TelemetryError { .. } => "telemetry",
            FraudWatchError::SerializationError { .. } => "serialization",
        }
    }

    /// Check if this error is due to caller input
    pub fn is_user_error(&self) -> bool {
        matches!(self, FraudWatchError::InvalidInput { .. })
    }
}

/// Map JSON serialization errors to FraudWatchError
impl From<serde_json::Error> for FraudWatchError {
    fn from(error: serde_json::Error) -> Self {
        FraudWatchError::serialization_error(format!("JSON serialization failed: {}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = FraudWatchError::invalid_input("test message");
        assert!(matches!(error, FraudWatchError::InvalidInput { .. }));
        assert_eq!(error.to_string(), "Invalid input: test message");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(FraudWatchError::invalid_input("x").category(), "invalid_input");
        assert_eq!(
            FraudWatchError::configuration_error("x").category(),
            "configuration"
        );
        assert_eq!(FraudWatchError::agent_error("x").category(), "agent");
        assert_eq!(FraudWatchError::workflow_error("x").category(), "workflow");
        assert_eq!(FraudWatchError::telemetry_error("x").category(), "telemetry");
        assert_eq!(
            FraudWatchError::serialization_error("x").category(),
            "serialization"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(FraudWatchError::invalid_input("bad input").is_user_error());
        assert!(!FraudWatchError::agent_error("stage failed").is_user_error());
        assert!(!FraudWatchError::telemetry_error("exporter down").is_user_error());
    }

    #[test]
    fn test_serialization_error_from_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: FraudWatchError = json_error.into();

        assert!(matches!(error, FraudWatchError::SerializationError { .. }));
        assert!(error.to_string().contains("JSON serialization failed"));
    }

    #[test]
    fn test_error_display_messages() {
        let errors = vec![
            FraudWatchError::invalid_input("empty transaction id"),
            FraudWatchError::agent_error("no response content"),
            FraudWatchError::workflow_error("risk stage aborted"),
            FraudWatchError::telemetry_error("OTLP exporter build failed"),
        ];

        for error in errors {
            let display_str = error.to_string();
            assert!(!display_str.is_empty());
            assert!(display_str.len() > 10);
        }
    }
}
