//! Error types for cloudflaere
//!
//! Collaborator failures (`Lookup`, `Discovery`, `Provider`, `Timeout`) are
//! always recoverable: the orchestrator logs them and retries on the next
//! cycle. `Mapping`, `Conflict` and `Authorization` describe per-hostname or
//! per-record skips. Only `Config` is fatal, and only at startup.

use std::time::Duration;
use thiserror::Error;

use crate::record::{Hostname, RecordType};

/// Result type alias for cloudflaere operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type
#[derive(Error, Debug)]
pub enum Error {
    /// Public address lookup failed (network or parse failure)
    #[error("Address lookup error: {0}")]
    Lookup(String),

    /// The reverse proxy could not be queried or returned unusable rules
    #[error("Route discovery error: {0}")]
    Discovery(String),

    /// DNS provider API failure
    #[error("Provider error{}: {message}", .status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Provider {
        /// HTTP status code, when the failure came from an API response
        status: Option<u16>,
        /// Error message
        message: String,
    },

    /// Hostname could not be placed in any known zone
    #[error("Cannot map {hostname} to a zone: {reason}")]
    Mapping {
        /// The discarded hostname
        hostname: Hostname,
        /// Why it was discarded
        reason: String,
    },

    /// More than one record exists for a hostname and type
    #[error("{count} {record_type} records exist for {hostname}; manual cleanup required")]
    Conflict {
        hostname: Hostname,
        record_type: RecordType,
        count: usize,
    },

    /// Record exists but does not carry this instance's ownership marker
    #[error("{record_type} record for {hostname} is not managed by this instance")]
    Authorization {
        hostname: Hostname,
        record_type: RecordType,
    },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single collaborator call exceeded its deadline
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out
        operation: String,
        /// The configured deadline
        after: Duration,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an address lookup error
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup(msg.into())
    }

    /// Create a route discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a provider error, optionally carrying the HTTP status
    pub fn provider(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    /// Create a mapping error for a hostname
    pub fn mapping(hostname: Hostname, reason: impl Into<String>) -> Self {
        Self::Mapping {
            hostname,
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// HTTP status attached to a provider error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => *status,
            _ => None,
        }
    }

    /// Whether the process should keep running after this error.
    ///
    /// Everything except configuration errors is retried on the next cycle.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config(_))
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_includes_status() {
        let err = Error::provider(Some(429), "rate limited");
        assert_eq!(err.to_string(), "Provider error (429): rate limited");
        assert_eq!(err.status(), Some(429));

        let err = Error::provider(None, "connection reset");
        assert_eq!(err.to_string(), "Provider error: connection reset");
        assert_eq!(err.status(), None);
    }

    #[test]
    fn only_config_errors_are_fatal() {
        assert!(!Error::config("missing token").is_recoverable());
        assert!(Error::lookup("dns failure").is_recoverable());
        assert!(Error::discovery("traefik down").is_recoverable());
        assert!(Error::provider(Some(500), "oops").is_recoverable());
        assert!(Error::timeout("list zones", Duration::from_secs(1)).is_recoverable());
    }

    #[test]
    fn conflict_message_names_the_record() {
        let err = Error::Conflict {
            hostname: Hostname::new("api.example.com").unwrap(),
            record_type: RecordType::A,
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "2 A records exist for api.example.com; manual cleanup required"
        );
    }
}
