//! # Error Handling
//!
//! This module provides error handling for the Gateplane gateway core.
//! It defines custom error types using `thiserror` for the execution pipeline.
//!
//! Two expected conditions are deliberately NOT errors and never appear here:
//! a context interruption (a policy stopping the pipeline with a target HTTP
//! outcome, see [`crate::pipeline::context::ExecutionFailure`]) and a
//! no-match outcome (flow selection or endpoint resolution returning
//! nothing). Both are ordinary values handled by the caller.

/// Custom result type for Gateplane operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the Gateplane gateway core
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Path template compilation errors
    #[error("Path template error: template '{template}': {message}")]
    PathCompile { template: String, message: String },

    /// Policy invocation faults
    #[error("Policy error: policy '{policy}': {message}")]
    Policy { policy: String, message: String },

    /// Endpoint connector faults
    #[error("Connector error: endpoint '{endpoint}': {message}")]
    Connector { endpoint: String, message: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors (deployment-time validation bugs, broken invariants)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new path template compilation error
    pub fn path_compile<T: Into<String>, M: Into<String>>(template: T, message: M) -> Self {
        Self::PathCompile { template: template.into(), message: message.into() }
    }

    /// Create a new policy fault
    pub fn policy<P: Into<String>, M: Into<String>>(policy: P, message: M) -> Self {
        Self::Policy { policy: policy.into(), message: message.into() }
    }

    /// Create a new connector fault
    pub fn connector<E: Into<String>, M: Into<String>>(endpoint: E, message: M) -> Self {
        Self::Connector { endpoint: endpoint.into(), message: message.into() }
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }
}

impl From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect::<Vec<_>>()
            .join("; ");

        Self::Config(format!("Validation failed: {}", message))
    }
}
