//! Fixed-order interceptor chain.
//!
//! Every call flows through the same stages, outermost first:
//!
//! 1. **RateLimit** - token-bucket admission control
//! 2. **RequestLog** - route, request id and elapsed time around the inner call
//! 3. **Authorization** - credential verification and the per-route decision
//! 4. **Validation** - the request message's field rules
//! 5. **Cancellation** - last checkpoint for caller disconnects and deadlines
//! 6. **PanicRecovery** - converts handler panics into `Internal`
//!
//! Each stage owns a fixed slot chosen by [`Interceptor::stage`], so the order
//! does not depend on the order stages are added to the builder.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use http::HeaderMap;
use portico_auth::route_name_from_rpc_method;
use portico_core::{CallContext, RequestMessage};
use tonic::Status;

use crate::interceptor::{BoxFuture, Call, Interceptor, Next, Reply};
use crate::stages::{
    AuthorizationStage, CancellationStage, PanicRecoveryStage, RateLimitStage, RequestLogStage,
    ValidationStage,
};

const STAGE_COUNT: usize = 6;

/// The fixed stage slots, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Stage {
    /// Stage 1: admission control
    RateLimit = 1,
    /// Stage 2: request logging and metrics
    RequestLog = 2,
    /// Stage 3: credential verification and authorization
    Authorization = 3,
    /// Stage 4: request validation
    Validation = 4,
    /// Stage 5: cancellation and deadline check
    Cancellation = 5,
    /// Stage 6: panic recovery
    PanicRecovery = 6,
}

impl Stage {
    /// Returns the stage name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::RequestLog => "request_log",
            Self::Authorization => "authorization",
            Self::Validation => "validation",
            Self::Cancellation => "cancellation",
            Self::PanicRecovery => "panic_recovery",
        }
    }

    /// Returns all stages in order.
    #[must_use]
    pub const fn all() -> [Stage; STAGE_COUNT] {
        [
            Self::RateLimit,
            Self::RequestLog,
            Self::Authorization,
            Self::Validation,
            Self::Cancellation,
            Self::PanicRecovery,
        ]
    }

    const fn slot(self) -> usize {
        self as usize - 1
    }
}

type BoxedInterceptor = Arc<dyn Interceptor>;

/// The interceptor chain. Immutable once built.
///
/// # Example
///
/// ```ignore
/// let pipeline = Pipeline::builder()
///     .with_stage(RateLimitStage::new(TokenBucket::new(100, 10.0)))
///     .with_stage(RequestLogStage::new())
///     .build();
///
/// let reply = pipeline
///     .unary(ctx, metadata, request, |ctx, req| async move { handle(ctx, req).await })
///     .await;
/// ```
pub struct Pipeline {
    stages: Vec<BoxedInterceptor>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Builds the full six-stage chain.
    #[must_use]
    pub fn standard(rate_limit: RateLimitStage, authorization: AuthorizationStage) -> Self {
        Self::builder()
            .with_stage(rate_limit)
            .with_stage(RequestLogStage::new())
            .with_stage(authorization)
            .with_stage(ValidationStage::new())
            .with_stage(CancellationStage::new())
            .with_stage(PanicRecoveryStage::new())
            .build()
    }

    /// Runs a unary call through the chain into `handler`.
    ///
    /// Resolves the route name from the context's method path before the
    /// first stage runs. The handler receives a snapshot of the context taken
    /// after every stage ran, including the injected identity.
    pub async fn unary<Req, Resp, H, Fut>(
        &self,
        mut ctx: CallContext,
        metadata: HeaderMap,
        request: Req,
        handler: H,
    ) -> Result<Resp, Status>
    where
        Req: RequestMessage,
        Resp: Send + 'static,
        H: FnOnce(CallContext, Req) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
    {
        let route = route_name_from_rpc_method(ctx.method()).to_string();
        ctx.set_route(route);

        let call = Call::new(metadata, Box::new(request));
        let next = self.build_chain(move |ctx: &mut CallContext, call: Call| -> BoxFuture<'static, Reply> {
            let snapshot = ctx.clone();
            Box::pin(async move {
                let request = call
                    .into_message()
                    .into_any()
                    .downcast::<Req>()
                    .map_err(|_| Status::internal("request type mismatch"))?;
                let response = handler(snapshot, *request).await?;
                Ok(Box::new(response) as Box<dyn Any + Send>)
            })
        });

        let reply = next.run(&mut ctx, call).await?;
        reply
            .downcast::<Resp>()
            .map(|response| *response)
            .map_err(|_| Status::internal("response type mismatch"))
    }

    fn build_chain<'a, H>(&'a self, handler: H) -> Next<'a>
    where
        H: FnOnce(&mut CallContext, Call) -> BoxFuture<'static, Reply> + Send + 'a,
    {
        let mut next = Next::handler(handler);
        for interceptor in self.stages.iter().rev() {
            next = Next::new(interceptor.as_ref(), next);
        }
        next
    }

    /// Returns the names of the installed stages in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.stage().name()).collect()
    }

    /// Returns the number of installed stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }
}

/// Builder for a [`Pipeline`].
///
/// Adding a stage whose slot is taken replaces the earlier one.
#[derive(Default)]
pub struct PipelineBuilder {
    slots: [Option<BoxedInterceptor>; STAGE_COUNT],
}

impl PipelineBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs a stage into its slot.
    #[must_use]
    pub fn with_stage<I: Interceptor>(mut self, interceptor: I) -> Self {
        let slot = interceptor.stage().slot();
        self.slots[slot] = Some(Arc::new(interceptor));
        self
    }

    /// Builds the pipeline with the installed stages in slot order.
    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.slots.into_iter().flatten().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[derive(Debug, PartialEq)]
    struct Echo(u32);
    impl RequestMessage for Echo {}

    #[test]
    fn test_stage_order() {
        let all = Stage::all();
        assert!(all.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(all[0].name(), "rate_limit");
        assert_eq!(all[5].name(), "panic_recovery");
    }

    #[test]
    fn test_builder_orders_by_slot_not_insertion() {
        let pipeline = Pipeline::builder()
            .with_stage(PanicRecoveryStage::new())
            .with_stage(ValidationStage::new())
            .with_stage(RequestLogStage::new())
            .build();

        assert_eq!(
            pipeline.stage_names(),
            vec!["request_log", "validation", "panic_recovery"]
        );
    }

    #[test]
    fn test_builder_replaces_taken_slot() {
        let pipeline = Pipeline::builder()
            .with_stage(ValidationStage::new())
            .with_stage(ValidationStage::new())
            .build();
        assert_eq!(pipeline.stage_count(), 1);
    }

    #[tokio::test]
    async fn test_unary_with_empty_pipeline_reaches_handler() {
        let pipeline = Pipeline::builder().build();
        let ctx = CallContext::new("/pkg.Svc/Echo");

        let reply = pipeline
            .unary(ctx, HeaderMap::new(), Echo(3), |ctx, req: Echo| async move {
                assert_eq!(ctx.route(), "Echo");
                Ok::<_, Status>(req.0 * 2)
            })
            .await;

        assert_eq!(reply.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_unary_forwards_handler_status() {
        let pipeline = Pipeline::builder().build();
        let ctx = CallContext::new("/pkg.Svc/Echo");

        let status = pipeline
            .unary(ctx, HeaderMap::new(), Echo(3), |_ctx, _req: Echo| async move {
                Err::<u32, _>(Status::already_exists("email taken"))
            })
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::AlreadyExists);
        assert_eq!(status.message(), "email taken");
    }
}
