//! Panic isolation.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::FutureExt;
use portico_core::{CallContext, GatewayError};

use crate::interceptor::{BoxFuture, Call, Interceptor, Next, Reply};
use crate::pipeline::Stage;

/// Message returned to the caller for every recovered panic.
pub const PANIC_MESSAGE: &str = "internal server error";

/// Stage 6: turns a panic escaping the handler into one `Internal` error.
///
/// The panic payload is logged server-side and never returned.
#[derive(Debug, Default)]
pub struct PanicRecoveryStage {
    recovered: AtomicU64,
}

impl PanicRecoveryStage {
    /// Creates the stage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of panics recovered so far.
    pub fn recovered(&self) -> u64 {
        self.recovered.load(Ordering::Relaxed)
    }
}

fn describe_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Interceptor for PanicRecoveryStage {
    fn stage(&self) -> Stage {
        Stage::PanicRecovery
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        call: Call,
        next: Next<'a>,
    ) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            let request_id = ctx.request_id();
            let route = ctx.route().to_string();

            match AssertUnwindSafe(next.run(ctx, call)).catch_unwind().await {
                Ok(reply) => reply,
                Err(payload) => {
                    self.recovered.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(
                        %request_id,
                        route = %route,
                        panic = %describe_payload(payload.as_ref()),
                        "recovered panic in handler"
                    );
                    portico_telemetry::record_panic(&route);
                    Err(GatewayError::internal(PANIC_MESSAGE).into())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_payload() {
        let text: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(describe_payload(text.as_ref()), "boom");

        let owned: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(describe_payload(owned.as_ref()), "kaboom");

        let other: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(describe_payload(other.as_ref()), "non-string panic payload");
    }
}
