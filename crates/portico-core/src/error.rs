//! Error types for Portico.
//!
//! [`GatewayError`] is the typed taxonomy every interceptor stage speaks.
//! Stages either forward an error unchanged or produce a new one; no bare
//! strings cross the chain boundary. Each variant maps onto exactly one RPC
//! status code:
//!
//! | Variant | RPC code |
//! |---|---|
//! | `InvalidArgument` | `INVALID_ARGUMENT` |
//! | `Unauthenticated` | `UNAUTHENTICATED` |
//! | `PermissionDenied` | `PERMISSION_DENIED` |
//! | `NotFound` | `NOT_FOUND` |
//! | `AlreadyExists` | `ALREADY_EXISTS` |
//! | `ResourceExhausted` | `RESOURCE_EXHAUSTED` |
//! | `Unavailable` | `UNAVAILABLE` |
//! | `Internal` | `INTERNAL` |
//! | `Unknown` | `UNKNOWN` |
//! | `Cancelled` | `CANCELLED` |
//! | `DeadlineExceeded` | `DEADLINE_EXCEEDED` |

use thiserror::Error;
use tonic::metadata::{MetadataMap, MetadataValue};
use tonic::{Code, Status};

use crate::validate::FieldErrors;

/// Result type alias using [`GatewayError`].
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Status metadata key carrying the seconds until a rate-limited caller may retry.
pub const RETRY_AFTER_METADATA: &str = "retry-after";

/// Standard error type for Portico.
///
/// # Example
///
/// ```
/// use portico_core::GatewayError;
/// use tonic::Code;
///
/// fn check_email(email: &str) -> Result<(), GatewayError> {
///     if email.is_empty() {
///         return Err(GatewayError::invalid_argument("email is required"));
///     }
///     Ok(())
/// }
///
/// let err = check_email("").unwrap_err();
/// assert_eq!(err.code(), Code::InvalidArgument);
/// ```
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The client sent structurally or semantically bad input.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Field-qualified description of every violated rule.
        message: String,
    },

    /// Missing, invalid or expired credential.
    #[error("unauthenticated: {message}")]
    Unauthenticated {
        /// Human-readable error message.
        message: String,
    },

    /// Valid credential, insufficient rights.
    #[error("permission denied: {message}")]
    PermissionDenied {
        /// Human-readable error message.
        message: String,
    },

    /// Resource not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// Resource already exists (unique key collision).
    #[error("already exists: {message}")]
    AlreadyExists {
        /// Human-readable error message.
        message: String,
    },

    /// Admission control rejected the call.
    #[error("resource exhausted: {message}")]
    ResourceExhausted {
        /// Human-readable error message.
        message: String,
        /// Seconds until the budget refills, when known.
        retry_after_secs: Option<u64>,
    },

    /// A dependency is down.
    #[error("unavailable: {message}")]
    Unavailable {
        /// Human-readable error message.
        message: String,
    },

    /// Unexpected failure.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
        /// The underlying error (never exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Unmapped route or requirement. Always fails closed.
    #[error("unknown: {message}")]
    Unknown {
        /// Human-readable error message.
        message: String,
    },

    /// The caller went away or the gateway is shutting down.
    #[error("cancelled: {message}")]
    Cancelled {
        /// Human-readable error message.
        message: String,
    },

    /// The call deadline passed before the handler ran.
    #[error("deadline exceeded: {message}")]
    DeadlineExceeded {
        /// Human-readable error message.
        message: String,
    },
}

impl GatewayError {
    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an unauthenticated error.
    #[must_use]
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Creates a permission denied error.
    #[must_use]
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates an already exists error.
    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    /// Creates a resource exhausted error.
    #[must_use]
    pub fn resource_exhausted(message: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        Self::ResourceExhausted {
            message: message.into(),
            retry_after_secs,
        }
    }

    /// Creates an unavailable error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Creates an unknown error.
    #[must_use]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::Unknown {
            message: message.into(),
        }
    }

    /// Creates a cancelled error.
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled {
            message: message.into(),
        }
    }

    /// Creates a deadline exceeded error.
    #[must_use]
    pub fn deadline_exceeded(message: impl Into<String>) -> Self {
        Self::DeadlineExceeded {
            message: message.into(),
        }
    }

    /// Returns the RPC status code for this error.
    #[must_use]
    pub const fn code(&self) -> Code {
        match self {
            Self::InvalidArgument { .. } => Code::InvalidArgument,
            Self::Unauthenticated { .. } => Code::Unauthenticated,
            Self::PermissionDenied { .. } => Code::PermissionDenied,
            Self::NotFound { .. } => Code::NotFound,
            Self::AlreadyExists { .. } => Code::AlreadyExists,
            Self::ResourceExhausted { .. } => Code::ResourceExhausted,
            Self::Unavailable { .. } => Code::Unavailable,
            Self::Internal { .. } => Code::Internal,
            Self::Unknown { .. } => Code::Unknown,
            Self::Cancelled { .. } => Code::Cancelled,
            Self::DeadlineExceeded { .. } => Code::DeadlineExceeded,
        }
    }

    /// Returns the bare message, without the variant prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidArgument { message }
            | Self::Unauthenticated { message }
            | Self::PermissionDenied { message }
            | Self::NotFound { message }
            | Self::AlreadyExists { message }
            | Self::ResourceExhausted { message, .. }
            | Self::Unavailable { message }
            | Self::Internal { message, .. }
            | Self::Unknown { message }
            | Self::Cancelled { message }
            | Self::DeadlineExceeded { message } => message,
        }
    }
}

impl From<GatewayError> for Status {
    fn from(err: GatewayError) -> Self {
        let code = err.code();
        match err {
            GatewayError::ResourceExhausted {
                message,
                retry_after_secs: Some(secs),
            } => {
                let mut metadata = MetadataMap::new();
                metadata.insert(RETRY_AFTER_METADATA, MetadataValue::from(secs));
                Status::with_metadata(code, message, metadata)
            }
            GatewayError::Internal {
                message,
                source: Some(source),
            } => {
                tracing::error!(error = %source, %message, "internal error");
                Status::new(code, message)
            }
            other => Status::new(code, other.message().to_string()),
        }
    }
}

impl From<FieldErrors> for GatewayError {
    fn from(errors: FieldErrors) -> Self {
        Self::invalid_argument(errors.to_string())
    }
}
