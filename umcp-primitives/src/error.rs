//! Shared error definitions for the capability bridge.

use std::error::Error as StdError;

use thiserror::Error;

/// Result alias used for metadata validation.
pub type Result<T> = std::result::Result<T, Error>;

/// Result alias returned by capability bodies and lifecycle hooks.
pub type CapabilityResult<T> = std::result::Result<T, CapabilityError>;

/// Errors that can occur while building primitive metadata.
#[derive(Debug, Error)]
pub enum Error {
    /// Tool name failed validation.
    #[error("invalid tool name `{name}`: {reason}")]
    InvalidToolName {
        /// The offending name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Capability or server metadata failed validation.
    #[error("invalid capability: {reason}")]
    InvalidCapability {
        /// Human-readable reason for rejection.
        reason: String,
    },
}

/// Recoverable, capability-authored failure.
///
/// Raised by `execute`, `initialize` and `shutdown` when a capability cannot
/// produce a result. The message is what remote callers see.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct CapabilityError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl CapabilityError {
    /// Creates an error carrying only a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error with a message and an underlying cause.
    #[must_use]
    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Wraps a non-capability failure raised while executing.
    #[must_use]
    pub fn execution_failed<E>(cause: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        Self::with_source("Execution failed", cause)
    }

    /// Returns the human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` when the error carries an underlying cause.
    #[must_use]
    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }
}

impl From<std::io::Error> for CapabilityError {
    fn from(value: std::io::Error) -> Self {
        Self::with_source(format!("I/O error: {value}"), value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_message_only() {
        let io = std::io::Error::other("socket reset");
        let err = CapabilityError::with_source("WHOIS query failed", io);
        assert_eq!(err.to_string(), "WHOIS query failed");
        assert!(err.has_source());
        assert_eq!(
            StdError::source(&err).map(ToString::to_string),
            Some("socket reset".to_owned())
        );
    }

    #[test]
    fn execution_failed_wraps_cause() {
        let err = CapabilityError::execution_failed("task cancelled");
        assert_eq!(err.message(), "Execution failed");
        assert!(err.has_source());
    }
}
