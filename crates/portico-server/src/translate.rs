//! RPC status → HTTP response translation.
//!
//! A fixed table decides, per RPC code, the HTTP status and whether the
//! client sees the handler's message or a generic one. The full message
//! always goes to the server log.
//!
//! | RPC code | HTTP | Body |
//! |---|---|---|
//! | `InvalidArgument` | 400 | message verbatim |
//! | `Unauthenticated` | 401 | generic, plus `WWW-Authenticate: Bearer` |
//! | `PermissionDenied` | 403 | generic |
//! | `NotFound` | 404 | message if non-empty, else generic |
//! | `AlreadyExists` | 409 | message verbatim |
//! | `ResourceExhausted` | 429 | generic, plus `Retry-After` when known |
//! | `Internal` | 500 | generic |
//! | `Unavailable` | 503 | generic, anomaly |
//! | anything else | standard mapping | message verbatim, anomaly |

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, RETRY_AFTER, WWW_AUTHENTICATE};
use http::{HeaderMap, Response, StatusCode};
use http_body_util::Full;
use portico_core::RETRY_AFTER_METADATA;
use tonic::{Code, Status};

use crate::transcode::HttpResponse;

/// How the client-visible message is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyPolicy {
    /// The status message, verbatim.
    PassThrough,
    /// A fixed message; the status message stays server-side.
    Generic(&'static str),
    /// The status message if non-empty, else the fixed message.
    SpecificOr(&'static str),
}

/// One row of the translation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorEnvelope {
    /// RPC code this row matches.
    pub code: Code,
    /// HTTP status sent to the client.
    pub http_status: StatusCode,
    /// Body policy.
    pub body: BodyPolicy,
    /// Whether hitting this row is logged as an anomaly.
    pub anomaly: bool,
}

const fn envelope(code: Code, http_status: StatusCode, body: BodyPolicy) -> ErrorEnvelope {
    ErrorEnvelope {
        code,
        http_status,
        body,
        anomaly: false,
    }
}

/// Generic body for 401 responses.
pub const UNAUTHENTICATED_MESSAGE: &str = "unauthorized, authenticate first.";

const ENVELOPES: [ErrorEnvelope; 8] = [
    envelope(Code::InvalidArgument, StatusCode::BAD_REQUEST, BodyPolicy::PassThrough),
    envelope(
        Code::Unauthenticated,
        StatusCode::UNAUTHORIZED,
        BodyPolicy::Generic(UNAUTHENTICATED_MESSAGE),
    ),
    envelope(
        Code::PermissionDenied,
        StatusCode::FORBIDDEN,
        BodyPolicy::Generic("permission denied"),
    ),
    envelope(
        Code::NotFound,
        StatusCode::NOT_FOUND,
        BodyPolicy::SpecificOr("not found"),
    ),
    envelope(Code::AlreadyExists, StatusCode::CONFLICT, BodyPolicy::PassThrough),
    envelope(
        Code::ResourceExhausted,
        StatusCode::TOO_MANY_REQUESTS,
        BodyPolicy::Generic("too many requests"),
    ),
    envelope(
        Code::Internal,
        StatusCode::INTERNAL_SERVER_ERROR,
        BodyPolicy::Generic("internal server error"),
    ),
    ErrorEnvelope {
        code: Code::Unavailable,
        http_status: StatusCode::SERVICE_UNAVAILABLE,
        body: BodyPolicy::Generic("service unavailable"),
        anomaly: true,
    },
];

/// The standard RPC → HTTP status mapping, used for codes outside the table.
#[must_use]
pub fn standard_http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
        Code::InvalidArgument | Code::FailedPrecondition | Code::OutOfRange => {
            StatusCode::BAD_REQUEST
        }
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::AlreadyExists | Code::Aborted => StatusCode::CONFLICT,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        Code::Unimplemented => StatusCode::NOT_IMPLEMENTED,
        Code::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        Code::Unknown | Code::Internal | Code::DataLoss => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A translated error, before it becomes a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translated {
    /// HTTP status.
    pub status: StatusCode,
    /// Client-visible message.
    pub message: String,
    /// Extra response headers.
    pub headers: HeaderMap,
}

/// Maps RPC statuses onto HTTP responses with `{"error": "..."}` bodies.
///
/// # Example
///
/// ```rust
/// use portico_server::ErrorTranslator;
/// use tonic::Status;
///
/// let translator = ErrorTranslator::new();
/// let translated = translator.translate(&Status::internal("db exploded"), "GetUser");
/// assert_eq!(translated.status.as_u16(), 500);
/// assert_eq!(translated.message, "internal server error");
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ErrorTranslator {
    envelopes: &'static [ErrorEnvelope],
}

impl Default for ErrorTranslator {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorTranslator {
    /// Creates a translator over the built-in table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            envelopes: &ENVELOPES,
        }
    }

    /// Returns the table row for `code`, if it has one.
    #[must_use]
    pub fn envelope(&self, code: Code) -> Option<&ErrorEnvelope> {
        self.envelopes.iter().find(|e| e.code == code)
    }

    /// Translates a status returned for `route`.
    #[must_use]
    pub fn translate(&self, status: &Status, route: &str) -> Translated {
        let code = status.code();
        let detail = status.message();

        let (http_status, message, anomaly) = match self.envelope(code) {
            Some(envelope) => {
                let message = match envelope.body {
                    BodyPolicy::PassThrough => detail.to_string(),
                    BodyPolicy::Generic(generic) => generic.to_string(),
                    BodyPolicy::SpecificOr(generic) if detail.is_empty() => generic.to_string(),
                    BodyPolicy::SpecificOr(_) => detail.to_string(),
                };
                (envelope.http_status, message, envelope.anomaly)
            }
            None => (standard_http_status(code), detail.to_string(), true),
        };

        if anomaly {
            tracing::warn!(
                anomaly = true,
                route,
                code = ?code,
                http_status = http_status.as_u16(),
                detail,
                "unusual error code reached the http edge"
            );
        } else if http_status.is_server_error() {
            tracing::error!(route, code = ?code, detail, "call failed");
        } else {
            tracing::debug!(route, code = ?code, detail, "call rejected");
        }

        let mut headers = HeaderMap::new();
        match code {
            Code::Unauthenticated => {
                headers.insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
            }
            Code::ResourceExhausted => {
                if let Some(retry) = status.metadata().get(RETRY_AFTER_METADATA) {
                    if let Ok(value) = HeaderValue::from_bytes(retry.as_bytes()) {
                        headers.insert(RETRY_AFTER, value);
                    }
                }
            }
            _ => {}
        }

        Translated {
            status: http_status,
            message,
            headers,
        }
    }

    /// Translates a status into a complete JSON error response.
    #[must_use]
    pub fn response(&self, status: &Status, route: &str) -> HttpResponse {
        let translated = self.translate(status, route);
        error_response(translated)
    }
}

fn error_response(translated: Translated) -> HttpResponse {
    let body = serde_json::json!({ "error": translated.message }).to_string();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = translated.status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.extend(translated.headers);
    response
}
