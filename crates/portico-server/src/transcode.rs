//! HTTP/JSON transcoding.
//!
//! [`HttpMux`] binds `METHOD /path/{param}` patterns to RPC methods. A bound
//! request is decoded into the same request message the RPC transport would
//! carry and dispatched through the same chain. The JSON body is read first,
//! then query parameters, then path parameters, each overriding the previous.
//! Numeric parameter values become JSON numbers so they bind to integer
//! fields.
//!
//! A payload that does not decode still enters the chain. Its violations
//! surface at the validation stage, so admission control and authorization
//! run first. Violations name the offending field and never carry decoder
//! text.
//!
//! [`HttpEdge`] wraps the mux with the edge concerns that sit outside the
//! chain: CORS and preflight, the health endpoint, security headers, request
//! ids and error translation.

use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE, ORIGIN};
use http::{HeaderMap, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use portico_auth::route_name_from_rpc_method;
use portico_core::{CallContext, FieldErrors, GatewayError, RequestId, RequestMessage};
use portico_middleware::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tonic::Status;

use crate::cors::CorsPolicy;
use crate::dispatch::Dispatcher;
use crate::error::{ServerError, ServerResult};
use crate::headers::{apply_security_headers, strip_transport_headers, REQUEST_ID_HEADER};
use crate::shutdown::{ConnectionTracker, ShutdownSignal};
use crate::translate::ErrorTranslator;

/// HTTP response body type.
pub type ResponseBody = Full<Bytes>;

/// HTTP response type.
pub type HttpResponse = Response<ResponseBody>;

/// Path served outside the chain for liveness probes.
pub const HEALTH_PATH: &str = "/healthz";

/// Largest request body accepted.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Payload key read for the owner id when the payload does not decode.
const OWNER_FIELD: &str = "user_id";

type HttpHandler = Arc<
    dyn Fn(Dispatcher, CallContext, HeaderMap, Payload) -> BoxFuture<'static, Result<Value, Status>>
        + Send
        + Sync,
>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

fn parse_pattern(pattern: &str) -> Vec<Segment> {
    pattern
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| match s.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => Segment::Param(name.to_string()),
            None => Segment::Literal(s.to_string()),
        })
        .collect()
}

fn match_segments(segments: &[Segment], path: &str) -> Option<Vec<(String, String)>> {
    let parts: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    if parts.len() != segments.len() {
        return None;
    }

    let mut params = Vec::new();
    for (segment, part) in segments.iter().zip(parts) {
        match segment {
            Segment::Literal(literal) if literal == part => {}
            Segment::Literal(_) => return None,
            Segment::Param(name) => params.push((name.clone(), part.to_string())),
        }
    }
    Some(params)
}

struct Binding {
    method: Method,
    pattern: String,
    segments: Vec<Segment>,
    rpc_method: String,
    route: String,
    handler: HttpHandler,
}

enum Lookup<'a> {
    Found(&'a Binding, Vec<(String, String)>),
    NotFound,
}

/// Table of HTTP bindings onto RPC methods.
///
/// # Example
///
/// ```rust,ignore
/// let mut mux = HttpMux::new();
/// mux.route(Method::GET, "/v1/users/{user_id}", "/portico.users.v1.Users/GetUser", {
///     let service = service.clone();
///     move |ctx, req| { let service = service.clone(); async move { service.get_user(ctx, req).await } }
/// })?;
/// ```
#[derive(Default)]
pub struct HttpMux {
    bindings: Vec<Binding>,
}

impl std::fmt::Debug for HttpMux {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.bindings
                    .iter()
                    .map(|b| format!("{} {} -> {}", b.method, b.pattern, b.rpc_method)),
            )
            .finish()
    }
}

impl HttpMux {
    /// Creates an empty mux.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `method pattern` to `rpc_method`, handled by `handler`.
    ///
    /// `Req` should default its missing fields (`#[serde(default)]`), as the
    /// generated protobuf messages do; decode failures are then reported per
    /// field.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::DuplicateBinding`] if the method and pattern are
    /// already bound.
    pub fn route<Req, Resp, H, Fut>(
        &mut self,
        method: Method,
        pattern: &str,
        rpc_method: &str,
        handler: H,
    ) -> ServerResult<&mut Self>
    where
        Req: RequestMessage + DeserializeOwned,
        Resp: Serialize + Send + 'static,
        H: Fn(CallContext, Req) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
    {
        let segments = parse_pattern(pattern);
        if self
            .bindings
            .iter()
            .any(|b| b.method == method && b.segments == segments)
        {
            return Err(ServerError::DuplicateBinding {
                method: method.to_string(),
                pattern: pattern.to_string(),
            });
        }

        let erased: HttpHandler = Arc::new(
            move |dispatcher: Dispatcher,
                  ctx: CallContext,
                  metadata: HeaderMap,
                  payload: Payload|
                  -> BoxFuture<'static, Result<Value, Status>> {
                let handler = handler.clone();
                let message = Transcoded::<Req>::decode(payload);
                Box::pin(async move {
                    let response = dispatcher
                        .dispatch(ctx, metadata, message, move |ctx, message: Transcoded<Req>| async move {
                            let request = message
                                .decoded
                                .map_err(|errors| Status::from(GatewayError::from(errors)))?;
                            handler(ctx, request).await
                        })
                        .await?;
                    serde_json::to_value(response)
                        .map_err(|_| Status::internal("failed to encode response"))
                })
            },
        );

        self.bindings.push(Binding {
            method,
            pattern: pattern.to_string(),
            segments,
            rpc_method: rpc_method.to_string(),
            route: route_name_from_rpc_method(rpc_method).to_string(),
            handler: erased,
        });
        Ok(self)
    }

    /// Returns the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns `true` if nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    // A path bound under another method is still a 404: method mismatches
    // are reported the same way as unknown paths.
    fn find(&self, method: &Method, path: &str) -> Lookup<'_> {
        self.bindings
            .iter()
            .filter(|b| b.method == method)
            .find_map(|b| match_segments(&b.segments, path).map(|params| Lookup::Found(b, params)))
            .unwrap_or(Lookup::NotFound)
    }
}

fn scalar(value: &str) -> Value {
    if let Ok(number) = value.parse::<u64>() {
        return Value::from(number);
    }
    match value {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(value.to_string()),
    }
}

/// Request fields gathered from the body, query and path, with the
/// violations found while gathering them.
#[derive(Debug, Default)]
struct Payload {
    fields: Map<String, Value>,
    errors: FieldErrors,
}

fn build_payload(body: &[u8], query: Option<&str>, params: Vec<(String, String)>) -> Payload {
    let mut payload = Payload::default();
    if !body.iter().all(u8::is_ascii_whitespace) {
        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(map)) => payload.fields = map,
            Ok(_) => payload.errors.add("body", "must be a JSON object"),
            Err(_) => payload.errors.add("body", "must be valid JSON"),
        }
    }

    if let Some(query) = query {
        match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
            Ok(pairs) => {
                for (key, value) in pairs {
                    payload.fields.insert(key, scalar(&value));
                }
            }
            Err(_) => payload.errors.add("query", "must be a valid query string"),
        }
    }

    for (key, value) in params {
        payload.fields.insert(key, scalar(&value));
    }
    payload
}

/// A transcoded request as it travels through the chain.
///
/// Holds either the decoded message or the violations that kept it from
/// decoding. Validation reports the violations; authorization reads the owner
/// id from the raw fields when there is no message.
struct Transcoded<Req> {
    fields: Map<String, Value>,
    decoded: Result<Req, FieldErrors>,
}

impl<Req: RequestMessage + DeserializeOwned> Transcoded<Req> {
    fn decode(payload: Payload) -> Self {
        let Payload { fields, errors } = payload;
        let decoded = if errors.is_empty() {
            serde_json::from_value(Value::Object(fields.clone()))
                .map_err(|_| decode_errors::<Req>(&fields))
        } else {
            Err(errors)
        };
        Self { fields, decoded }
    }
}

impl<Req: RequestMessage> RequestMessage for Transcoded<Req> {
    fn validate(&self) -> Result<(), FieldErrors> {
        match &self.decoded {
            Ok(request) => request.validate(),
            Err(errors) => Err(errors.clone()),
        }
    }

    fn owner_id(&self) -> Option<String> {
        match &self.decoded {
            Ok(request) => request.owner_id(),
            Err(_) => match self.fields.get(OWNER_FIELD)? {
                Value::Number(number) => Some(number.to_string()),
                Value::String(value) => Some(value.clone()),
                _ => None,
            },
        }
    }
}

// Finds the fields `Req` rejects by decoding each one on its own, then names
// the shape the field accepts.
fn decode_errors<Req: DeserializeOwned>(fields: &Map<String, Value>) -> FieldErrors {
    let accepts = |key: &str, value: Value| {
        let mut lone = Map::new();
        lone.insert(key.to_string(), value);
        serde_json::from_value::<Req>(Value::Object(lone)).is_ok()
    };

    let mut errors = FieldErrors::new();
    for (key, value) in fields {
        if accepts(key, value.clone()) {
            continue;
        }
        let expected = if accepts(key, Value::from(0.5)) {
            "must be a number"
        } else if accepts(key, Value::from(-1)) {
            "must be an integer"
        } else if accepts(key, Value::from(0)) {
            "must be an unsigned integer"
        } else if accepts(key, Value::from("")) {
            "must be a string"
        } else if accepts(key, Value::Bool(false)) {
            "must be a boolean"
        } else if accepts(key, Value::Array(Vec::new())) {
            "must be a list"
        } else {
            "has an invalid value"
        };
        errors.add(key.as_str(), expected);
    }

    if errors.is_empty() {
        errors.add("body", "does not match the request message");
    }
    errors
}

fn json_response(status: StatusCode, body: &Value) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// The HTTP listener's request handler.
pub struct HttpEdge {
    mux: HttpMux,
    dispatcher: Dispatcher,
    translator: ErrorTranslator,
    cors: CorsPolicy,
}

impl std::fmt::Debug for HttpEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEdge")
            .field("mux", &self.mux)
            .field("cors", &self.cors)
            .finish_non_exhaustive()
    }
}

impl HttpEdge {
    /// Creates the edge over a populated mux.
    #[must_use]
    pub fn new(mux: HttpMux, dispatcher: Dispatcher, cors: CorsPolicy) -> Self {
        Self {
            mux,
            dispatcher,
            translator: ErrorTranslator::new(),
            cors,
        }
    }

    /// Handles one request.
    pub async fn handle<B>(&self, request: Request<B>) -> HttpResponse
    where
        B: hyper::body::Body<Data = Bytes> + Send,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let request_id = RequestId::new();
        let origin = request
            .headers()
            .get(ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut response = self.route(request, request_id).await;

        let headers = response.headers_mut();
        self.cors.apply(origin.as_deref(), headers);
        apply_security_headers(headers);
        strip_transport_headers(headers);
        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            headers.insert(REQUEST_ID_HEADER, value);
        }
        response
    }

    async fn route<B>(&self, request: Request<B>, request_id: RequestId) -> HttpResponse
    where
        B: hyper::body::Body<Data = Bytes> + Send,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        if request.method() == Method::OPTIONS {
            return Response::new(Full::new(Bytes::new()));
        }
        if request.method() == Method::GET && request.uri().path() == HEALTH_PATH {
            return json_response(StatusCode::OK, &serde_json::json!({ "status": "ok" }));
        }

        let path = request.uri().path().to_string();
        let query = request.uri().query().map(str::to_string);
        let (binding, params) = match self.mux.find(request.method(), &path) {
            Lookup::Found(binding, params) => (binding, params),
            Lookup::NotFound => {
                tracing::debug!(method = %request.method(), path, "no http binding");
                return self.translator.response(&Status::not_found(""), "");
            }
        };

        let (parts, body) = request.into_parts();
        let payload = match Limited::new(body, MAX_BODY_BYTES).collect().await {
            Ok(collected) => build_payload(&collected.to_bytes(), query.as_deref(), params),
            Err(_) => {
                let mut payload = build_payload(&[], query.as_deref(), params);
                payload.errors.add(
                    "body",
                    format!("must be readable and at most {MAX_BODY_BYTES} bytes"),
                );
                payload
            }
        };

        let ctx = self
            .dispatcher
            .context(&binding.rpc_method, &parts.headers)
            .with_request_id(request_id);
        match (binding.handler)(self.dispatcher.clone(), ctx, parts.headers, payload).await {
            Ok(body) => json_response(StatusCode::OK, &body),
            Err(status) => self.translator.response(&status, &binding.route),
        }
    }
}

/// Serves HTTP/1.1 connections until `shutdown`, then drains in-flight
/// requests for at most `drain_timeout`.
pub(crate) async fn serve_http(
    listener: TcpListener,
    edge: Arc<HttpEdge>,
    shutdown: ShutdownSignal,
    drain_timeout: Duration,
) -> ServerResult<()> {
    let tracker = ConnectionTracker::new();
    let mut connections = JoinSet::new();
    let local_addr = listener.local_addr()?;
    tracing::info!(addr = %local_addr, "http listener started");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(error) => {
                        tracing::error!(%error, "failed to accept http connection");
                        continue;
                    }
                };

                let edge = Arc::clone(&edge);
                let token = tracker.acquire();
                let shutdown = shutdown.clone();

                connections.spawn(async move {
                    let service = service_fn(move |request: Request<Incoming>| {
                        let edge = Arc::clone(&edge);
                        async move { Ok::<_, Infallible>(edge.handle(request).await) }
                    });
                    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                    tokio::pin!(conn);

                    let result = tokio::select! {
                        result = conn.as_mut() => result,
                        () = shutdown.recv() => {
                            conn.as_mut().graceful_shutdown();
                            conn.await
                        }
                    };
                    if let Err(error) = result {
                        tracing::debug!(%error, %remote_addr, "http connection ended with error");
                    }
                    drop(token);
                });
            }

            Some(_) = connections.join_next(), if !connections.is_empty() => {}

            () = shutdown.recv() => {
                tracing::info!("http listener stopping");
                break;
            }
        }
    }

    tracing::info!(
        active = tracker.active_connections(),
        timeout_secs = drain_timeout.as_secs(),
        "draining http connections"
    );
    if tokio::time::timeout(drain_timeout, tracker.wait_idle())
        .await
        .is_err()
    {
        tracing::warn!(
            active = tracker.active_connections(),
            "drain timeout reached, aborting remaining http connections"
        );
        connections.abort_all();
        while connections.join_next().await.is_some() {}
    }
    tracing::info!("http listener stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::Validator;
    use portico_middleware::{Pipeline, RateLimitStage, TokenBucket, ValidationStage};
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct GetUserQuery {
        user_id: u64,
        verbose: bool,
        tag: String,
    }

    impl RequestMessage for GetUserQuery {
        fn validate(&self) -> Result<(), FieldErrors> {
            Validator::new().positive("user_id", self.user_id).finish()
        }
    }

    fn edge() -> HttpEdge {
        let pipeline = Pipeline::builder().with_stage(ValidationStage::new()).build();
        let dispatcher = Dispatcher::new(Arc::new(pipeline));
        let mut mux = HttpMux::new();
        mux.route(
            Method::GET,
            "/v1/users/{user_id}",
            "/pkg.Users/GetUser",
            |ctx: CallContext, req: GetUserQuery| async move {
                Ok::<_, Status>(serde_json::json!({
                    "route": ctx.route(),
                    "user_id": req.user_id,
                    "verbose": req.verbose,
                    "tag": req.tag,
                }))
            },
        )
        .unwrap();
        HttpEdge::new(mux, dispatcher, CorsPolicy::permissive())
    }

    fn request(method: Method, uri: &str, body: &'static str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(Bytes::from_static(body.as_bytes())))
            .unwrap()
    }

    async fn body_json(response: HttpResponse) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_pattern_matching() {
        let segments = parse_pattern("/v1/users/{user_id}/delete");
        assert_eq!(
            match_segments(&segments, "/v1/users/7/delete"),
            Some(vec![("user_id".to_string(), "7".to_string())])
        );
        assert_eq!(match_segments(&segments, "/v1/users/7"), None);
        assert_eq!(match_segments(&segments, "/v1/groups/7/delete"), None);
    }

    #[test]
    fn test_payload_precedence() {
        let payload = build_payload(
            br#"{"user_id": 1, "tag": "body"}"#,
            Some("tag=query&verbose=true"),
            vec![("user_id".to_string(), "9".to_string())],
        );
        assert!(payload.errors.is_empty());
        assert_eq!(payload.fields["user_id"], 9);
        assert_eq!(payload.fields["tag"], "query");
        assert_eq!(payload.fields["verbose"], true);
    }

    #[test]
    fn test_payload_rejects_non_objects() {
        let payload = build_payload(b"[1,2]", None, Vec::new());
        assert_eq!(payload.errors.to_string(), "body must be a JSON object");

        let payload = build_payload(b"{oops", None, vec![("user_id".to_string(), "7".to_string())]);
        assert_eq!(payload.errors.to_string(), "body must be valid JSON");
        assert_eq!(payload.fields["user_id"], 7);
    }

    #[test]
    fn test_undecodable_payload_names_fields() {
        let payload = build_payload(
            br#"{"verbose": "loud", "tag": 3}"#,
            None,
            vec![("user_id".to_string(), "abc".to_string())],
        );
        let message = Transcoded::<GetUserQuery>::decode(payload);
        let errors = message.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.fields["verbose"], ["must be a boolean"]);
        assert_eq!(errors.fields["tag"], ["must be a string"]);
        assert_eq!(errors.fields["user_id"], ["must be an unsigned integer"]);
        assert_eq!(message.owner_id().as_deref(), Some("abc"));
    }

    #[test]
    fn test_decoded_payload_defers_to_message() {
        let payload = build_payload(b"", None, vec![("user_id".to_string(), "0".to_string())]);
        let message = Transcoded::<GetUserQuery>::decode(payload);
        assert!(message.decoded.is_ok());
        assert_eq!(
            message.validate().unwrap_err().to_string(),
            "user_id must be greater than 0"
        );
    }

    #[test]
    fn test_duplicate_binding_rejected() {
        let mut mux = HttpMux::new();
        let handler = |_: CallContext, _: GetUserQuery| async { Ok::<_, Status>(()) };
        mux.route(Method::GET, "/v1/a/{id}", "/p.S/A", handler).unwrap();
        let err = mux
            .route(Method::GET, "/v1/a/{other}", "/p.S/B", handler)
            .unwrap_err();
        assert!(matches!(err, ServerError::DuplicateBinding { .. }));
        assert!(mux.route(Method::POST, "/v1/a/{id}", "/p.S/B", handler).is_ok());
    }

    #[tokio::test]
    async fn test_transcodes_path_params() {
        let response = edge()
            .handle(request(Method::GET, "/v1/users/7", ""))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(response.headers()["x-frame-options"], "DENY");

        let body = body_json(response).await;
        assert_eq!(body["route"], "GetUser");
        assert_eq!(body["user_id"], 7);
    }

    #[tokio::test]
    async fn test_validation_error_translated() {
        let response = edge()
            .handle(request(Method::GET, "/v1/users/0", ""))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "user_id must be greater than 0"
        );
    }

    #[tokio::test]
    async fn test_unknown_path_and_method_are_404() {
        let edge = edge();
        for (method, uri) in [(Method::GET, "/v1/nothing"), (Method::POST, "/v1/users/7")] {
            let response = edge.handle(request(method, uri, "")).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
            assert_eq!(response.headers()["x-content-type-options"], "nosniff");
            assert_eq!(body_json(response).await["error"], "not found");
        }
    }

    #[tokio::test]
    async fn test_preflight_and_health() {
        let edge = edge();

        let response = edge
            .handle(request(Method::OPTIONS, "/v1/users/7", ""))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());

        let response = edge.handle(request(Method::GET, HEALTH_PATH, "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_bad_json_is_invalid_argument() {
        let response = edge()
            .handle(request(Method::GET, "/v1/users/7", "{not json"))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "body must be valid JSON");
    }

    #[tokio::test]
    async fn test_bad_param_reported_by_field() {
        let response = edge()
            .handle(request(Method::GET, "/v1/users/abc", ""))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "user_id must be an unsigned integer"
        );
    }

    #[tokio::test]
    async fn test_undecodable_request_spends_rate_budget() {
        let bucket = Arc::new(TokenBucket::new(1, 0.0));
        let pipeline = Pipeline::builder()
            .with_stage(RateLimitStage::new(Arc::clone(&bucket)))
            .with_stage(ValidationStage::new())
            .build();
        let mut mux = HttpMux::new();
        mux.route(
            Method::GET,
            "/v1/users/{user_id}",
            "/pkg.Users/GetUser",
            |_: CallContext, _: GetUserQuery| async { Ok::<_, Status>(()) },
        )
        .unwrap();
        let edge = HttpEdge::new(
            mux,
            Dispatcher::new(Arc::new(pipeline)),
            CorsPolicy::permissive(),
        );

        let response = edge.handle(request(Method::GET, "/v1/users/abc", "")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(bucket.available() < 1.0);

        let response = edge.handle(request(Method::GET, "/v1/users/abc", "")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn test_drain_timeout_aborts_stuck_connections() {
        let pipeline = Pipeline::builder().build();
        let mut mux = HttpMux::new();
        mux.route(
            Method::GET,
            "/v1/stuck",
            "/pkg.Users/Stuck",
            |_: CallContext, _: GetUserQuery| async {
                std::future::pending::<()>().await;
                Ok::<_, Status>(())
            },
        )
        .unwrap();
        let edge = Arc::new(HttpEdge::new(
            mux,
            Dispatcher::new(Arc::new(pipeline)),
            CorsPolicy::permissive(),
        ));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = ShutdownSignal::new();
        let server = tokio::spawn(serve_http(
            listener,
            edge,
            shutdown.clone(),
            Duration::from_millis(50),
        ));

        let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .unwrap();
        tokio::spawn(conn);
        let pending = tokio::spawn(async move {
            sender
                .send_request(request(Method::GET, "/v1/stuck", ""))
                .await
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown.trigger();
        server.await.unwrap().unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .expect("connection should be closed after the drain timeout")
            .unwrap();
        assert!(outcome.is_err());
    }
}
