//! Response headers applied on the HTTP edge to every response, success or error.

use http::header::{
    HeaderName, HeaderValue, CONTENT_SECURITY_POLICY, STRICT_TRANSPORT_SECURITY,
    X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
};
use http::HeaderMap;

/// Header carrying the call's request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Content-type header leaked by the RPC transcoding layer.
pub const LEAKED_CONTENT_TYPE_HEADER: &str = "grpc-metadata-content-type";

const SECURITY_HEADERS: [(HeaderName, &str); 5] = [
    (
        CONTENT_SECURITY_POLICY,
        "default-src 'none'; frame-ancestors 'none'",
    ),
    (X_FRAME_OPTIONS, "DENY"),
    (X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (
        STRICT_TRANSPORT_SECURITY,
        "max-age=31536000; includeSubDomains",
    ),
    (X_XSS_PROTECTION, "1; mode=block"),
];

/// Sets the fixed security header set.
pub fn apply_security_headers(headers: &mut HeaderMap) {
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
}

/// Removes transport-specific headers that must not reach HTTP clients.
pub fn strip_transport_headers(headers: &mut HeaderMap) {
    headers.remove(LEAKED_CONTENT_TYPE_HEADER);
}
