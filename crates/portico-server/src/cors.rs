//! CORS handling for the HTTP listener.

use http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE, VARY,
};
use http::HeaderMap;

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Authorization, Content-Type, X-Api-Key, Grpc-Timeout";
const EXPOSE_HEADERS: &str = "X-Request-Id, Retry-After, WWW-Authenticate";
const MAX_AGE_SECS: &str = "600";

/// Origin allow-list.
///
/// # Example
///
/// ```rust
/// use http::HeaderMap;
/// use portico_server::CorsPolicy;
///
/// let cors = CorsPolicy::new(["https://app.example.com"]);
/// let mut headers = HeaderMap::new();
/// cors.apply(Some("https://app.example.com"), &mut headers);
/// assert_eq!(headers["access-control-allow-origin"], "https://app.example.com");
/// ```
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    any_origin: bool,
    origins: Vec<String>,
}

impl CorsPolicy {
    /// Creates a policy. An entry of `"*"` allows every origin.
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let origins: Vec<String> = origins.into_iter().map(Into::into).collect();
        Self {
            any_origin: origins.iter().any(|o| o == "*"),
            origins,
        }
    }

    /// Allows every origin.
    #[must_use]
    pub fn permissive() -> Self {
        Self::new(["*"])
    }

    /// Adds CORS headers for a request from `origin`.
    ///
    /// Disallowed origins get no `Access-Control-Allow-Origin`, so browsers
    /// block the response.
    pub fn apply(&self, origin: Option<&str>, headers: &mut HeaderMap) {
        if self.any_origin {
            headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        } else if let Some(origin) = origin.filter(|o| self.origins.iter().any(|a| a == o)) {
            if let Ok(value) = HeaderValue::from_str(origin) {
                headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, value);
                headers.append(VARY, HeaderValue::from_static("Origin"));
            }
        }

        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSE_HEADERS),
        );
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECS));
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}
