//! Call context types.
//!
//! The [`CallContext`] is created at chain entry by the transport, carries the
//! verified identity together with the cancellation signal and deadline, and is
//! discarded at chain exit. It is never persisted or shared across calls.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::identity::Identity;

/// Metadata header carrying the caller's deadline, in RPC timeout notation.
pub const GRPC_TIMEOUT_HEADER: &str = "grpc-timeout";

/// A unique identifier for each call, using UUID v7.
///
/// # Example
///
/// ```
/// use portico_core::RequestId;
///
/// let id = RequestId::new();
/// assert_eq!(id.to_string().len(), 36);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new time-ordered request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-call context that flows through the interceptor chain into the handler.
///
/// # Example
///
/// ```
/// use portico_core::CallContext;
/// use std::time::Duration;
///
/// let ctx = CallContext::new("/portico.users.v1.Users/GetUser")
///     .with_timeout(Duration::from_secs(5));
///
/// assert!(ctx.identity().is_none());
/// assert!(!ctx.is_cancelled());
/// assert!(!ctx.deadline_exceeded());
/// ```
#[derive(Debug, Clone)]
pub struct CallContext {
    request_id: RequestId,

    /// Full RPC method path, `/<package>.<Service>/<Method>`.
    method: String,

    /// Route name resolved from the method path. Empty until resolved.
    route: String,

    /// Set by the authorization stage on ALLOW.
    identity: Option<Identity>,

    cancellation: CancellationToken,
    deadline: Option<Instant>,
    started_at: Instant,
}

impl CallContext {
    /// Creates a context for a call to the given RPC method path.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            method: method.into(),
            route: String::new(),
            identity: None,
            cancellation: CancellationToken::new(),
            deadline: None,
            started_at: Instant::now(),
        }
    }

    /// Uses a request id minted by the transport, so the id it echoes to the
    /// caller matches the one every stage logs.
    #[must_use]
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }

    /// Binds the call to a cancellation token, usually a child of the
    /// gateway's shutdown token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets an absolute deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets a deadline relative to the call start.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(self.started_at + timeout);
        self
    }

    /// Sets the deadline from a `grpc-timeout` header value, if present and well-formed.
    #[must_use]
    pub fn with_timeout_header(self, value: Option<&str>) -> Self {
        match value.and_then(parse_grpc_timeout) {
            Some(timeout) => self.with_timeout(timeout),
            None => self,
        }
    }

    /// Returns the request ID.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// Returns the full RPC method path.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Returns the resolved route name (empty if unresolvable).
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Sets the resolved route name.
    pub fn set_route(&mut self, route: impl Into<String>) {
        self.route = route.into();
    }

    /// Returns the verified caller, if any.
    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Injects the verified caller. Only the authorization stage calls this.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    /// Returns the cancellation token for this call.
    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Returns `true` once the call has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Returns the deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns `true` once the deadline has passed.
    #[must_use]
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Time remaining until the deadline, if any.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Returns when the call entered the chain.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Returns the elapsed time since the call entered the chain.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Parses an RPC timeout value such as `"5S"`, `"250m"` or `"100u"`.
///
/// The value is at most eight ASCII digits followed by a unit:
/// `H` hours, `M` minutes, `S` seconds, `m` milliseconds, `u` microseconds,
/// `n` nanoseconds.
///
/// # Example
///
/// ```
/// use portico_core::parse_grpc_timeout;
/// use std::time::Duration;
///
/// assert_eq!(parse_grpc_timeout("5S"), Some(Duration::from_secs(5)));
/// assert_eq!(parse_grpc_timeout("250m"), Some(Duration::from_millis(250)));
/// assert_eq!(parse_grpc_timeout("soon"), None);
/// ```
#[must_use]
pub fn parse_grpc_timeout(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.len() < 2 {
        return None;
    }
    let (digits, unit) = value.split_at(value.len() - 1);
    if digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let amount: u64 = digits.parse().ok()?;

    match unit {
        "H" => Some(Duration::from_secs(amount * 3600)),
        "M" => Some(Duration::from_secs(amount * 60)),
        "S" => Some(Duration::from_secs(amount)),
        "m" => Some(Duration::from_millis(amount)),
        "u" => Some(Duration::from_micros(amount)),
        "n" => Some(Duration::from_nanos(amount)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Role;

    #[test]
    fn test_request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn test_new_context_is_anonymous() {
        let ctx = CallContext::new("/pkg.Svc/Method");
        assert_eq!(ctx.method(), "/pkg.Svc/Method");
        assert_eq!(ctx.route(), "");
        assert!(ctx.identity().is_none());
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn test_set_identity() {
        let mut ctx = CallContext::new("/pkg.Svc/Method");
        ctx.set_identity(Identity::new("7", "ann", Role::Default));
        assert_eq!(ctx.identity().map(Identity::subject_id), Some("7"));
    }

    #[test]
    fn test_cancellation_propagates_from_parent() {
        let parent = CancellationToken::new();
        let ctx = CallContext::new("/pkg.Svc/Method").with_cancellation(parent.child_token());
        assert!(!ctx.is_cancelled());
        parent.cancel();
        assert!(ctx.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_exceeded_after_timeout() {
        let ctx = CallContext::new("/pkg.Svc/Method").with_timeout(Duration::from_millis(100));
        assert!(!ctx.deadline_exceeded());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert!(ctx.deadline_exceeded());
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[test]
    fn test_timeout_header_ignored_when_malformed() {
        let ctx = CallContext::new("/pkg.Svc/Method").with_timeout_header(Some("later"));
        assert!(ctx.deadline().is_none());
    }

    #[test]
    fn test_parse_grpc_timeout_units() {
        assert_eq!(parse_grpc_timeout("1H"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_grpc_timeout("2M"), Some(Duration::from_secs(120)));
        assert_eq!(parse_grpc_timeout("3S"), Some(Duration::from_secs(3)));
        assert_eq!(parse_grpc_timeout("4m"), Some(Duration::from_millis(4)));
        assert_eq!(parse_grpc_timeout("5u"), Some(Duration::from_micros(5)));
        assert_eq!(parse_grpc_timeout("6n"), Some(Duration::from_nanos(6)));
    }

    #[test]
    fn test_parse_grpc_timeout_rejects_garbage() {
        assert_eq!(parse_grpc_timeout(""), None);
        assert_eq!(parse_grpc_timeout("S"), None);
        assert_eq!(parse_grpc_timeout("123456789S"), None);
        assert_eq!(parse_grpc_timeout("-1S"), None);
        assert_eq!(parse_grpc_timeout("10x"), None);
    }
}
