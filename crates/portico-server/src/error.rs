//! Server error types.

use std::net::SocketAddr;

use portico_auth::RouteError;
use thiserror::Error;

/// Errors raised while assembling or running the gateway.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configured address could not be parsed.
    #[error("invalid address '{addr}': {reason}")]
    InvalidAddress {
        /// The offending address.
        addr: String,
        /// Parser message.
        reason: String,
    },

    /// A listener could not bind.
    #[error("failed to bind {addr}")]
    Bind {
        /// Address the listener tried to bind.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Two services registered the same route, or a route was malformed.
    #[error("route registration failed: {0}")]
    Route(#[from] RouteError),

    /// Two HTTP bindings share a method and path pattern.
    #[error("duplicate http binding: {method} {pattern}")]
    DuplicateBinding {
        /// HTTP method.
        method: String,
        /// Path pattern.
        pattern: String,
    },

    /// The RPC listener failed.
    #[error("rpc transport error: {0}")]
    Rpc(#[from] tonic::transport::Error),

    /// Listener I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A listener task ended abnormally.
    #[error("listener task failed: {0}")]
    Task(String),
}

impl ServerError {
    /// Create an invalid address error.
    pub fn invalid_address(addr: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::InvalidAddress {
            addr: addr.into(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ServerError::invalid_address("nowhere", "invalid socket address syntax");
        assert_eq!(
            err.to_string(),
            "invalid address 'nowhere': invalid socket address syntax"
        );

        let err = ServerError::from(RouteError::Duplicate("GetUser".to_string()));
        assert!(err.to_string().contains("GetUser"));
    }
}
