//! Store error types.

use portico_core::GatewayError;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by a [`Store`](crate::Store).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record matched.
    #[error("{collection} not found")]
    NotFound {
        /// Collection that was searched.
        collection: &'static str,
    },

    /// A unique field collided with an existing record.
    #[error("{collection}.{field} already exists")]
    AlreadyExists {
        /// Collection written to.
        collection: &'static str,
        /// The unique field that collided.
        field: &'static str,
    },

    /// The backing database is missing or unreachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store URL is not understood by this backend.
    #[error("invalid store url: {0}")]
    InvalidUrl(String),

    /// The surrounding call was cancelled.
    #[error("store operation cancelled")]
    Cancelled,

    /// The surrounding call's deadline passed.
    #[error("store operation deadline exceeded")]
    DeadlineExceeded,

    /// A transaction lost a race with a concurrent write.
    #[error("transaction conflicted with a concurrent write")]
    Conflict,

    /// A record could not be converted to or from its stored form.
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Creates a not found error.
    #[must_use]
    pub const fn not_found(collection: &'static str) -> Self {
        Self::NotFound { collection }
    }
}

impl From<StoreError> for GatewayError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { collection } => Self::not_found(format!("{collection} not found")),
            StoreError::AlreadyExists { field, .. } => {
                Self::already_exists(format!("{field} already in use"))
            }
            StoreError::Unavailable(message) => Self::unavailable(message),
            StoreError::Cancelled => Self::cancelled("store operation cancelled"),
            StoreError::DeadlineExceeded => Self::deadline_exceeded("store operation deadline exceeded"),
            StoreError::Conflict => Self::unavailable("concurrent modification, retry the call"),
            other @ (StoreError::InvalidUrl(_) | StoreError::Serialization(_)) => {
                Self::internal_with_source("store failure", other)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(err: StoreError) -> String {
        format!("{:?}", GatewayError::from(err).code())
    }

    #[test]
    fn test_error_display() {
        assert_eq!(StoreError::not_found("users").to_string(), "users not found");
        let err = StoreError::AlreadyExists {
            collection: "users",
            field: "email",
        };
        assert_eq!(err.to_string(), "users.email already exists");
    }

    #[test]
    fn test_gateway_mapping() {
        assert_eq!(code_of(StoreError::not_found("users")), "NotFound");
        assert_eq!(
            code_of(StoreError::AlreadyExists {
                collection: "users",
                field: "email"
            }),
            "AlreadyExists"
        );
        assert_eq!(code_of(StoreError::Unavailable("down".into())), "Unavailable");
        assert_eq!(code_of(StoreError::Cancelled), "Cancelled");
        assert_eq!(code_of(StoreError::DeadlineExceeded), "DeadlineExceeded");
        assert_eq!(code_of(StoreError::InvalidUrl("x".into())), "Internal");
    }

    #[test]
    fn test_already_exists_message_names_field() {
        let err = GatewayError::from(StoreError::AlreadyExists {
            collection: "users",
            field: "email",
        });
        assert_eq!(err.message(), "email already in use");
    }
}
