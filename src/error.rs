//! Unified error type for the adapter layer
//!
//! Transport faults are absorbed and retried inside the adapters; only
//! configuration errors are fatal. Command failures are not errors at all,
//! they are typed results (see [`crate::command::CommandOutcome`]).

use std::time::Duration;

/// Error taxonomy for the device-adapter layer
#[derive(Debug, thiserror::Error, Clone)]
pub enum LinkError {
    /// Configuration error - fatal, fails adapter construction
    #[error("Configuration error in field '{field}': {reason}")]
    Configuration { field: String, reason: String },

    /// Transport error - recoverable, triggers reconnection
    #[error("Transport error: {reason} (retryable: {retryable})")]
    Transport { reason: String, retryable: bool },

    /// Protocol violation - recoverable via reconnection, but distinct
    /// from a plain disconnect: the byte stream has desynced
    #[error("Protocol violation: {reason}")]
    Protocol { reason: String },

    /// Operation did not complete within its deadline
    #[error("Operation '{operation}' timeout after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    /// Cooperative cancellation - the adapter is shutting down
    #[error("Shutdown requested")]
    Shutdown,
}

impl LinkError {
    /// Whether a retry can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::Configuration { .. } => false,
            LinkError::Transport { retryable, .. } => *retryable,
            LinkError::Protocol { .. } => true,
            LinkError::Timeout { .. } => true,
            LinkError::Shutdown => false,
        }
    }

    /// Stable error code for logs and health details
    pub fn error_code(&self) -> &'static str {
        match self {
            LinkError::Configuration { .. } => "CONFIG_ERROR",
            LinkError::Transport { .. } => "TRANSPORT_ERROR",
            LinkError::Protocol { .. } => "PROTOCOL_VIOLATION",
            LinkError::Timeout { .. } => "TIMEOUT_ERROR",
            LinkError::Shutdown => "SHUTDOWN",
        }
    }
}

/// Convenience constructors
impl LinkError {
    /// Create a configuration error
    pub fn config_error(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a transport error
    pub fn transport_error(reason: impl Into<String>, retryable: bool) -> Self {
        Self::Transport {
            reason: reason.into(),
            retryable,
        }
    }

    /// Create a protocol violation
    pub fn protocol_error(reason: impl Into<String>) -> Self {
        Self::Protocol {
            reason: reason.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout_error(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(error: std::io::Error) -> Self {
        let retryable = matches!(
            error.kind(),
            std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::Interrupted
        );

        LinkError::Transport {
            reason: format!("IO error: {}", error),
            retryable,
        }
    }
}
