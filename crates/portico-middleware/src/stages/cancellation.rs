//! Cancellation checkpoint.

use portico_core::{CallContext, GatewayError};

use crate::interceptor::{BoxFuture, Call, Interceptor, Next, Reply};
use crate::pipeline::Stage;

/// Stage 5: the last point before the handler where a cancelled call or a
/// passed deadline stops the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancellationStage;

impl CancellationStage {
    /// Creates the stage.
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for CancellationStage {
    fn stage(&self) -> Stage {
        Stage::Cancellation
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        call: Call,
        next: Next<'a>,
    ) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            if ctx.is_cancelled() {
                return Err(GatewayError::cancelled("call cancelled").into());
            }
            if ctx.deadline_exceeded() {
                return Err(GatewayError::deadline_exceeded("call deadline exceeded").into());
            }
            next.run(ctx, call).await
        })
    }
}
