//! End-to-end tests for the interceptor chain.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
use parking_lot::Mutex;
use portico_auth::{AuthRequirement, AuthorizationEngine, CredentialCodec, RouteTable};
use portico_core::{CallContext, FieldErrors, RequestMessage, Role, Validator};
use portico_middleware::{
    AuthorizationStage, BoxFuture, Call, Interceptor, Next, PanicRecoveryStage, Pipeline,
    RateLimitStage, Reply, Stage, TokenBucket, PANIC_MESSAGE,
};
use tokio_util::sync::CancellationToken;
use tonic::{Code, Status};

const SECRET: &[u8] = b"pipeline-test-secret";

#[derive(Debug)]
struct UserRequest {
    user_id: u64,
    email: String,
}

impl UserRequest {
    fn new(user_id: u64) -> Self {
        Self {
            user_id,
            email: "ann@example.com".to_string(),
        }
    }
}

impl RequestMessage for UserRequest {
    fn validate(&self) -> Result<(), FieldErrors> {
        Validator::new()
            .positive("user_id", self.user_id)
            .required("email", &self.email)
            .email("email", &self.email)
            .finish()
    }

    fn owner_id(&self) -> Option<String> {
        Some(self.user_id.to_string())
    }
}

fn routes() -> Arc<RouteTable> {
    Arc::new(
        RouteTable::from_routes([
            ("Ping", AuthRequirement::Public),
            ("Whoami", AuthRequirement::AuthenticatedUser),
            ("GetUser", AuthRequirement::SelfOnly),
            ("ListUsers", AuthRequirement::Admin),
            ("CountUsers", AuthRequirement::ApiKey),
        ])
        .unwrap(),
    )
}

fn codec() -> Arc<CredentialCodec> {
    Arc::new(CredentialCodec::new(SECRET, 7))
}

fn pipeline_with_bucket(bucket: TokenBucket) -> Pipeline {
    Pipeline::standard(
        RateLimitStage::new(Arc::new(bucket)),
        AuthorizationStage::new(
            routes(),
            codec(),
            AuthorizationEngine::new().with_api_key("internal-key"),
        ),
    )
}

fn pipeline() -> Pipeline {
    pipeline_with_bucket(TokenBucket::new(1_000, 1_000.0))
}

fn ctx(route: &str) -> CallContext {
    CallContext::new(format!("/portico.users.v1.Users/{route}"))
}

fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    headers
}

fn token(id: &str, role: Role) -> String {
    codec().issue(id, "someone", role).unwrap()
}

fn expired_token() -> String {
    let issued = chrono::Utc::now() - chrono::Duration::days(8);
    codec().issue_at("7", "ann", Role::Default, issued).unwrap()
}

async fn call(
    pipeline: &Pipeline,
    route: &str,
    headers: HeaderMap,
    request: UserRequest,
) -> Result<String, Status> {
    pipeline
        .unary(ctx(route), headers, request, |ctx, req: UserRequest| async move {
            let who = ctx
                .identity()
                .map_or_else(|| "anonymous".to_string(), |i| i.subject_id().to_string());
            Ok(format!("{who}:{}", req.user_id))
        })
        .await
}

#[tokio::test]
async fn test_public_route_ignores_credential_state() {
    let pipeline = pipeline();

    let anonymous = call(&pipeline, "Ping", HeaderMap::new(), UserRequest::new(1)).await;
    assert_eq!(anonymous.unwrap(), "anonymous:1");

    let expired = call(&pipeline, "Ping", bearer(&expired_token()), UserRequest::new(1)).await;
    assert_eq!(expired.unwrap(), "anonymous:1");

    let malformed = call(&pipeline, "Ping", bearer("garbage"), UserRequest::new(1)).await;
    assert_eq!(malformed.unwrap(), "anonymous:1");
}

#[tokio::test]
async fn test_scenario_a_self_route() {
    let pipeline = pipeline();
    let token = codec().issue("7", "ann", Role::Default).unwrap();

    let own = call(&pipeline, "GetUser", bearer(&token), UserRequest::new(7)).await;
    assert_eq!(own.unwrap(), "7:7");

    let other = call(&pipeline, "GetUser", bearer(&token), UserRequest::new(8)).await;
    assert_eq!(other.unwrap_err().code(), Code::PermissionDenied);
}

#[tokio::test]
async fn test_scenario_b_anonymous_admin_call_is_unauthenticated() {
    let status = call(&pipeline(), "ListUsers", HeaderMap::new(), UserRequest::new(1))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn test_admin_route_rejects_default_role_regardless_of_content() {
    let pipeline = pipeline();
    for user_id in [0, 1, 7, 99] {
        let status = call(
            &pipeline,
            "ListUsers",
            bearer(&token("7", Role::Default)),
            UserRequest::new(user_id),
        )
        .await
        .unwrap_err();
        assert_eq!(status.code(), Code::PermissionDenied);
    }

    let admin = call(
        &pipeline,
        "ListUsers",
        bearer(&token("1", Role::Admin)),
        UserRequest::new(5),
    )
    .await;
    assert_eq!(admin.unwrap(), "1:5");
}

#[tokio::test]
async fn test_expired_credential_on_protected_route() {
    let status = call(&pipeline(), "Whoami", bearer(&expired_token()), UserRequest::new(7))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn test_api_key_route() {
    let pipeline = pipeline();

    let missing = call(&pipeline, "CountUsers", HeaderMap::new(), UserRequest::new(1)).await;
    assert_eq!(missing.unwrap_err().code(), Code::PermissionDenied);

    let mut headers = HeaderMap::new();
    headers.insert("x-api-key", "internal-key".parse().unwrap());
    assert!(call(&pipeline, "CountUsers", headers, UserRequest::new(1)).await.is_ok());
}

#[tokio::test]
async fn test_unmapped_route_is_treated_as_admin() {
    let status = call(
        &pipeline(),
        "DropEverything",
        bearer(&token("7", Role::Default)),
        UserRequest::new(7),
    )
    .await
    .unwrap_err();
    assert_eq!(status.code(), Code::PermissionDenied);
}

#[tokio::test]
async fn test_unresolvable_route_fails_closed() {
    let status = pipeline()
        .unary(
            CallContext::new("NoSlash"),
            HeaderMap::new(),
            UserRequest::new(1),
            |_ctx, _req: UserRequest| async move { Ok::<_, Status>(()) },
        )
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unknown);
}

#[tokio::test]
async fn test_scenario_c_rate_limit_rejects_without_running_handler() {
    let pipeline = pipeline_with_bucket(TokenBucket::new(1, 0.0));
    let handled = Arc::new(AtomicUsize::new(0));

    for expected in [Ok(()), Err(Code::ResourceExhausted), Err(Code::ResourceExhausted)] {
        let handled = Arc::clone(&handled);
        let reply = pipeline
            .unary(ctx("Ping"), HeaderMap::new(), UserRequest::new(1), move |_ctx, _req: UserRequest| async move {
                handled.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Status>(())
            })
            .await;
        assert_eq!(reply.map_err(|s| s.code()), expected);
    }

    assert_eq!(handled.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_validation_lists_every_violation() {
    let request = UserRequest {
        user_id: 0,
        email: String::new(),
    };
    let status = call(&pipeline(), "Ping", HeaderMap::new(), request)
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert_eq!(
        status.message(),
        "user_id must be greater than 0, email is required"
    );
}

#[tokio::test]
async fn test_authorization_runs_before_validation() {
    let request = UserRequest {
        user_id: 8,
        email: String::new(),
    };
    let status = call(&pipeline(), "GetUser", bearer(&token("7", Role::Default)), request)
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::PermissionDenied);
}

#[tokio::test]
async fn test_cancelled_call_never_reaches_handler() {
    let token = CancellationToken::new();
    let ctx = ctx("Ping").with_cancellation(token.child_token());
    token.cancel();

    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);
    let status = pipeline()
        .unary(ctx, HeaderMap::new(), UserRequest::new(1), move |_ctx, _req: UserRequest| async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), Status>(())
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Cancelled);
    assert_eq!(handled.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_exceeded_before_handler() {
    let ctx = ctx("Ping").with_timeout(Duration::from_millis(50));
    tokio::time::advance(Duration::from_millis(60)).await;

    let status = pipeline()
        .unary(ctx, HeaderMap::new(), UserRequest::new(1), |_ctx, _req: UserRequest| async move {
            Ok::<_, Status>(())
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::DeadlineExceeded);
}

#[derive(Debug)]
struct CustomPayload {
    _detail: u32,
}

#[tokio::test]
async fn test_panics_become_one_internal_error_each() {
    let recovery = Arc::new(PanicRecoveryStage::new());
    let pipeline = Pipeline::builder().with_stage(Arc::clone(&recovery)).build();

    let payloads: Vec<Box<dyn Fn() + Send + Sync>> = vec![
        Box::new(|| panic!("static str secret")),
        Box::new(|| panic!("{}", String::from("owned secret"))),
        Box::new(|| std::panic::panic_any(CustomPayload { _detail: 7 })),
    ];

    for (i, trigger) in payloads.into_iter().enumerate() {
        let status = pipeline
            .unary(ctx("Ping"), HeaderMap::new(), UserRequest::new(1), move |_ctx, _req: UserRequest| async move {
                trigger();
                Ok::<(), Status>(())
            })
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), PANIC_MESSAGE);
        assert_eq!(recovery.recovered(), i as u64 + 1);
    }
}

struct Recorder {
    stage: Stage,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Interceptor for Recorder {
    fn stage(&self) -> Stage {
        self.stage
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        call: Call,
        next: Next<'a>,
    ) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            self.log.lock().push(self.stage.name());
            next.run(ctx, call).await
        })
    }
}

#[tokio::test]
async fn test_stages_run_in_fixed_order_whatever_the_insertion_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let recorder = |stage| Recorder {
        stage,
        log: Arc::clone(&log),
    };

    let pipeline = Pipeline::builder()
        .with_stage(recorder(Stage::PanicRecovery))
        .with_stage(recorder(Stage::Validation))
        .with_stage(recorder(Stage::RateLimit))
        .with_stage(recorder(Stage::Cancellation))
        .with_stage(recorder(Stage::Authorization))
        .with_stage(recorder(Stage::RequestLog))
        .build();

    let handler_log = Arc::clone(&log);
    pipeline
        .unary(ctx("Ping"), HeaderMap::new(), UserRequest::new(1), move |_ctx, _req: UserRequest| async move {
            handler_log.lock().push("handler");
            Ok::<_, Status>(())
        })
        .await
        .unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            "rate_limit",
            "request_log",
            "authorization",
            "validation",
            "cancellation",
            "panic_recovery",
            "handler",
        ]
    );
}
