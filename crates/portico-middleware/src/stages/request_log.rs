//! Request logging.

use portico_core::CallContext;
use tonic::Code;

use crate::interceptor::{BoxFuture, Call, Interceptor, Next, Reply};
use crate::pipeline::Stage;

/// Stage 2: logs route, request id and elapsed time around the inner chain
/// and records request metrics. The inner result is returned untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogStage;

impl RequestLogStage {
    /// Creates the stage.
    pub fn new() -> Self {
        Self
    }
}

const fn is_server_fault(code: Code) -> bool {
    matches!(
        code,
        Code::Internal | Code::Unknown | Code::Unavailable | Code::DataLoss
    )
}

impl Interceptor for RequestLogStage {
    fn stage(&self) -> Stage {
        Stage::RequestLog
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        call: Call,
        next: Next<'a>,
    ) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            let reply = next.run(ctx, call).await;
            let elapsed = ctx.elapsed();
            let elapsed_ms = elapsed.as_millis() as u64;
            let subject = ctx.identity().map(|i| i.log_id());

            let code = match &reply {
                Ok(_) => {
                    tracing::info!(
                        request_id = %ctx.request_id(),
                        route = ctx.route(),
                        subject,
                        elapsed_ms,
                        "call completed"
                    );
                    Code::Ok
                }
                Err(status) if is_server_fault(status.code()) => {
                    tracing::error!(
                        request_id = %ctx.request_id(),
                        route = ctx.route(),
                        subject,
                        elapsed_ms,
                        code = ?status.code(),
                        error = status.message(),
                        "call failed"
                    );
                    status.code()
                }
                Err(status) => {
                    tracing::info!(
                        request_id = %ctx.request_id(),
                        route = ctx.route(),
                        subject,
                        elapsed_ms,
                        code = ?status.code(),
                        error = status.message(),
                        "call rejected"
                    );
                    status.code()
                }
            };

            portico_telemetry::record_request(ctx.route(), &format!("{code:?}"), elapsed);
            reply
        })
    }
}
