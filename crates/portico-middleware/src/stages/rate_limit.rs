//! Token-bucket admission control.
//!
//! One bucket is shared by every caller of the process. A call that finds the
//! bucket empty is rejected with `ResourceExhausted` before any inner stage
//! runs; calls are never queued.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use portico_core::{CallContext, GatewayError};
use tokio::time::Instant;

use crate::interceptor::{BoxFuture, Call, Interceptor, Next, Reply};
use crate::pipeline::Stage;

/// Process-wide token bucket.
///
/// The token count always stays within `[0, capacity]`.
///
/// # Example
///
/// ```
/// use portico_middleware::TokenBucket;
///
/// let bucket = TokenBucket::new(1, 0.0);
/// assert!(bucket.try_acquire().is_ok());
/// assert!(bucket.try_acquire().is_err());
/// ```
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// A rejected admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    /// Time until one token is available. `None` if the bucket never refills.
    pub retry_after: Option<Duration>,
}

impl TokenBucket {
    /// Creates a full bucket.
    #[must_use]
    pub fn new(capacity: u32, refill_per_second: f64) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            refill_per_second: refill_per_second.max(0.0),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Takes one token if available.
    pub fn try_acquire(&self) -> Result<(), Rejected> {
        self.try_acquire_at(Instant::now())
    }

    /// Takes one token if available at `now`.
    pub fn try_acquire_at(&self, now: Instant) -> Result<(), Rejected> {
        let mut state = self.state.lock();
        self.refill(&mut state, now);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(());
        }

        let retry_after = (self.refill_per_second > 0.0)
            .then(|| Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_second));
        Err(Rejected { retry_after })
    }

    /// Tokens currently available, after refilling up to now.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state, Instant::now());
        state.tokens
    }

    /// Returns the bucket capacity.
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        if now <= state.last_refill {
            return;
        }
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_second).clamp(0.0, self.capacity);
        state.last_refill = now;
    }
}

/// Stage 1: rejects calls when the shared bucket is empty.
#[derive(Debug, Clone)]
pub struct RateLimitStage {
    bucket: Arc<TokenBucket>,
}

impl RateLimitStage {
    /// Creates the stage over a shared bucket.
    pub fn new(bucket: Arc<TokenBucket>) -> Self {
        Self { bucket }
    }

    /// Returns the shared bucket.
    pub fn bucket(&self) -> &Arc<TokenBucket> {
        &self.bucket
    }
}

impl Interceptor for RateLimitStage {
    fn stage(&self) -> Stage {
        Stage::RateLimit
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        call: Call,
        next: Next<'a>,
    ) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            if let Err(rejected) = self.bucket.try_acquire() {
                let retry_after_secs = rejected
                    .retry_after
                    .map(|d| d.as_secs_f64().ceil().max(1.0) as u64);
                tracing::warn!(
                    request_id = %ctx.request_id(),
                    route = ctx.route(),
                    retry_after_secs,
                    "rate limit exceeded"
                );
                portico_telemetry::record_rate_limited(ctx.route());
                return Err(
                    GatewayError::resource_exhausted("rate limit exceeded", retry_after_secs).into(),
                );
            }
            next.run(ctx, call).await
        })
    }
}
