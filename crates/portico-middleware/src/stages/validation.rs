//! Request validation.

use portico_core::{CallContext, GatewayError};

use crate::interceptor::{BoxFuture, Call, Interceptor, Next, Reply};
use crate::pipeline::Stage;

/// Stage 4: checks the request message's field rules.
///
/// On failure returns `InvalidArgument` listing every violated rule,
/// comma-joined.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationStage;

impl ValidationStage {
    /// Creates the stage.
    pub fn new() -> Self {
        Self
    }
}

impl Interceptor for ValidationStage {
    fn stage(&self) -> Stage {
        Stage::Validation
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        call: Call,
        next: Next<'a>,
    ) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            if let Err(errors) = call.message().validate() {
                tracing::debug!(
                    request_id = %ctx.request_id(),
                    route = ctx.route(),
                    violations = errors.len(),
                    "request failed validation"
                );
                return Err(GatewayError::from(errors).into());
            }
            next.run(ctx, call).await
        })
    }
}
