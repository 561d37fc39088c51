//! Entry point from both transports into the interceptor chain.

use std::future::Future;
use std::sync::Arc;

use http::HeaderMap;
use portico_core::{CallContext, RequestMessage, GRPC_TIMEOUT_HEADER};
use portico_middleware::Pipeline;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Runs calls from either transport through the same [`Pipeline`].
///
/// Every call gets a fresh [`CallContext`] whose cancellation token is a child
/// of the dispatcher's, so cancelling the dispatcher at shutdown cancels every
/// call that has not reached its handler yet.
///
/// Business services hold a `Dispatcher` and route each RPC method through
/// [`Dispatcher::rpc`]; the HTTP mux uses [`Dispatcher::call`] with the same
/// handler, so both transports share one chain.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    pipeline: Arc<Pipeline>,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Creates a dispatcher over `pipeline`.
    #[must_use]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            cancel: CancellationToken::new(),
        }
    }

    /// Returns the token cancelled at shutdown.
    #[must_use]
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the pipeline.
    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Builds the context for a call to `method`, honouring a `grpc-timeout`
    /// header when present.
    #[must_use]
    pub fn context(&self, method: &str, metadata: &HeaderMap) -> CallContext {
        let timeout = metadata
            .get(GRPC_TIMEOUT_HEADER)
            .and_then(|v| v.to_str().ok());
        CallContext::new(method)
            .with_cancellation(self.cancel.child_token())
            .with_timeout_header(timeout)
    }

    /// Runs a call with a prepared context.
    pub async fn dispatch<Req, Resp, H, Fut>(
        &self,
        ctx: CallContext,
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
        self.pipeline.unary(ctx, metadata, request, handler).await
    }

    /// Runs a call to `method`.
    pub async fn call<Req, Resp, H, Fut>(
        &self,
        method: &str,
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
        let ctx = self.context(method, &metadata);
        self.dispatch(ctx, metadata, request, handler).await
    }

    /// Runs an RPC-transport call to `method`.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// async fn get_user(&self, request: Request<GetUserRequest>) -> Result<Response<User>, Status> {
    ///     let service = self.service.clone();
    ///     self.dispatcher
    ///         .rpc(GET_USER, request, move |ctx, req| async move { service.get_user(ctx, req).await })
    ///         .await
    /// }
    /// ```
    pub async fn rpc<Req, Resp, H, Fut>(
        &self,
        method: &str,
        request: tonic::Request<Req>,
        handler: H,
    ) -> Result<tonic::Response<Resp>, Status>
    where
        Req: RequestMessage,
        Resp: Send + 'static,
        H: FnOnce(CallContext, Req) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Resp, Status>> + Send + 'static,
    {
        let (metadata, _, message) = request.into_parts();
        self.call(method, metadata.into_headers(), message, handler)
            .await
            .map(tonic::Response::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use portico_middleware::CancellationStage;
    use tonic::Code;

    struct Echo(u64);

    impl RequestMessage for Echo {}

    fn dispatcher() -> Dispatcher {
        let pipeline = Pipeline::builder().with_stage(CancellationStage::new()).build();
        Dispatcher::new(Arc::new(pipeline))
    }

    #[tokio::test]
    async fn test_call_reaches_handler_with_route() {
        let result = dispatcher()
            .call("/pkg.Svc/Echo", HeaderMap::new(), Echo(7), |ctx, req| async move {
                Ok::<_, Status>((ctx.route().to_string(), req.0))
            })
            .await
            .unwrap();
        assert_eq!(result, ("Echo".to_string(), 7));
    }

    #[tokio::test]
    async fn test_context_reads_timeout_header() {
        let mut metadata = HeaderMap::new();
        metadata.insert(GRPC_TIMEOUT_HEADER, HeaderValue::from_static("5S"));
        let ctx = dispatcher().context("/pkg.Svc/Echo", &metadata);
        assert!(ctx.deadline().is_some());
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_calls() {
        let dispatcher = dispatcher();
        dispatcher.shutdown_token().cancel();

        let err = dispatcher
            .call("/pkg.Svc/Echo", HeaderMap::new(), Echo(1), |_, _| async {
                Ok::<_, Status>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Cancelled);
    }

    #[tokio::test]
    async fn test_rpc_wraps_response() {
        let response = dispatcher()
            .rpc("/pkg.Svc/Echo", tonic::Request::new(Echo(3)), |_, req| async move {
                Ok::<_, Status>(req.0 * 2)
            })
            .await
            .unwrap();
        assert_eq!(response.into_inner(), 6);
    }
}
