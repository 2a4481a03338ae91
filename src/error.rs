//! Error types for the VM provisioner
//!
//! Provides structured error types for inventory lookups, command execution,
//! capacity inspection and disk-layout synthesis.

use std::time::Duration;
use thiserror::Error;

/// Unified error type for the provisioner
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Request Validation Errors
    // =========================================================================
    #[error("Missing required field: {field}")]
    MissingInput { field: String },

    #[error("Invalid disk layout: {0}")]
    InvalidLayout(String),

    // =========================================================================
    // Inventory Resolution Errors
    // =========================================================================
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    #[error("{kind} '{name}' is ambiguous: {} candidates ({})", .candidates.len(), .candidates.join(", "))]
    Ambiguous {
        kind: String,
        name: String,
        candidates: Vec<String>,
    },

    #[error("Malformed inventory response: {0}")]
    MalformedResponse(String),

    // =========================================================================
    // Command Execution Errors
    // =========================================================================
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Inventory endpoint connection unstable: {0}")]
    TransientNetwork(String),

    #[error("Command failed: {command} (exit code {code:?}): {message}")]
    Execution {
        command: String,
        code: Option<i32>,
        message: String,
    },

    #[error("Command timed out after {timeout:?}: {command}")]
    CommandTimeout { command: String, timeout: Duration },

    #[error("Command output exceeded {limit} bytes: {command}")]
    OutputLimitExceeded { command: String, limit: usize },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What a caller should do after an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Re-authenticate the session once, then retry the call once
    Reauthenticate,
    /// Surface to the caller, who may issue a new request later
    RetryByCaller,
    /// Fatal for this request
    Fail,
}

impl Error {
    pub fn missing(field: impl Into<String>) -> Self {
        Error::MissingInput {
            field: field.into(),
        }
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Determine how this error should be handled
    pub fn action(&self) -> RecoveryAction {
        match self {
            Error::Auth(_) => RecoveryAction::Reauthenticate,

            // Unstable connection or slow endpoint - the caller decides
            Error::TransientNetwork(_) | Error::CommandTimeout { .. } => {
                RecoveryAction::RetryByCaller
            }

            // Retrying an unchanged query gives the same answer
            _ => RecoveryAction::Fail,
        }
    }

    /// Check if this error is transient
    pub fn is_transient(&self) -> bool {
        matches!(self.action(), RecoveryAction::RetryByCaller)
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Error::MissingInput { .. } => "missing_input",
            Error::InvalidLayout(_) => "invalid_layout",
            Error::NotFound { .. } => "not_found",
            Error::Ambiguous { .. } => "ambiguous",
            Error::MalformedResponse(_) => "malformed_response",
            Error::Auth(_) => "auth_error",
            Error::TransientNetwork(_) => "transient_network_error",
            Error::Execution { .. } => "execution_error",
            Error::CommandTimeout { .. } => "command_timeout",
            Error::OutputLimitExceeded { .. } => "output_limit_exceeded",
            Error::Configuration(_) => "configuration_error",
            Error::Internal(_) | Error::Yaml(_) | Error::Metrics(_) | Error::Io(_) => {
                "internal_error"
            }
        }
    }

    /// Operator-facing hint for errors the caller may retry
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::TransientNetwork(_) => Some(
                "the connection to the inventory endpoint is unstable; submit the request again",
            ),
            Error::CommandTimeout { .. } => {
                Some("the inventory endpoint did not answer in time; submit the request again")
            }
            _ => None,
        }
    }
}

/// Result type alias for the provisioner
pub type Result<T> = std::result::Result<T, Error>;
