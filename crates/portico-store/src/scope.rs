//! Call scoping for store operations.

use portico_core::CallContext;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::{StoreError, StoreResult};

/// Cancellation signal and deadline a store handle honours.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl Scope {
    /// An unbounded scope.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Inherits the call's cancellation and deadline.
    #[must_use]
    pub fn from_call(ctx: &CallContext) -> Self {
        Self {
            deadline: ctx.deadline(),
            cancellation: Some(ctx.cancellation().clone()),
        }
    }

    /// Sets a deadline.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Binds a cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Fails if the scope was cancelled or its deadline passed.
    pub fn check(&self) -> StoreResult<()> {
        if self
            .cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(StoreError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(StoreError::DeadlineExceeded);
        }
        Ok(())
    }
}
