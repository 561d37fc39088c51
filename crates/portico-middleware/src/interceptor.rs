//! Core interceptor trait and types.
//!
//! Every stage implements [`Interceptor`]. A stage receives the mutable
//! [`CallContext`], the type-erased [`Call`] and a [`Next`] continuation, and
//! either passes control on by running `next` or terminates the chain with a
//! typed error.
//!
//! # Example
//!
//! ```ignore
//! use portico_middleware::{BoxFuture, Call, Interceptor, Next, Reply, Stage};
//! use portico_core::CallContext;
//!
//! struct Timing;
//!
//! impl Interceptor for Timing {
//!     fn stage(&self) -> Stage {
//!         Stage::RequestLog
//!     }
//!
//!     fn intercept<'a>(
//!         &'a self,
//!         ctx: &'a mut CallContext,
//!         call: Call,
//!         next: Next<'a>,
//!     ) -> BoxFuture<'a, Reply> {
//!         Box::pin(async move {
//!             let reply = next.run(ctx, call).await;
//!             tracing::info!(elapsed_ms = ctx.elapsed().as_millis() as u64, "done");
//!             reply
//!         })
//!     }
//! }
//! ```

use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use http::HeaderMap;
use portico_core::{CallContext, RequestMessage};
use tonic::Status;

use crate::pipeline::Stage;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What the chain returns: the handler's type-erased response or a status.
pub type Reply = Result<Box<dyn Any + Send>, Status>;

/// Header carrying the shared key for `ApiKey` routes.
pub const API_KEY_HEADER: &str = "x-api-key";

/// An inbound call as seen by the interceptor chain.
pub struct Call {
    metadata: HeaderMap,
    message: Box<dyn RequestMessage>,
}

impl Call {
    /// Wraps call metadata and a request message.
    pub fn new(metadata: HeaderMap, message: Box<dyn RequestMessage>) -> Self {
        Self { metadata, message }
    }

    /// Returns the call metadata (RPC metadata or HTTP headers).
    pub fn metadata(&self) -> &HeaderMap {
        &self.metadata
    }

    /// Returns a metadata value as a string, if present and ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.metadata.get(name).and_then(|v| v.to_str().ok())
    }

    /// Borrows the request message.
    pub fn message(&self) -> &dyn RequestMessage {
        self.message.as_ref()
    }

    /// Takes the request message out of the call.
    pub fn into_message(self) -> Box<dyn RequestMessage> {
        self.message
    }
}

impl std::fmt::Debug for Call {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("metadata_keys", &self.metadata.len())
            .finish_non_exhaustive()
    }
}

/// A stage in the interceptor chain.
///
/// # Invariants
///
/// - A stage runs `next` at most once.
/// - A stage never retries the inner chain.
/// - A stage forwards inner errors unchanged or replaces them with a typed
///   error; only panic recovery collapses failures into `Internal`.
pub trait Interceptor: Send + Sync + 'static {
    /// The fixed slot this stage occupies.
    fn stage(&self) -> Stage;

    /// Processes the call.
    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        call: Call,
        next: Next<'a>,
    ) -> BoxFuture<'a, Reply>;
}

/// Lets a caller keep a handle on a stage after installing it.
impl<T: Interceptor> Interceptor for Arc<T> {
    fn stage(&self) -> Stage {
        (**self).stage()
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        call: Call,
        next: Next<'a>,
    ) -> BoxFuture<'a, Reply> {
        (**self).intercept(ctx, call, next)
    }
}

/// Continuation that runs the rest of the chain.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        interceptor: &'a dyn Interceptor,
        next: Box<Next<'a>>,
    },
    Handler(Box<dyn FnOnce(&mut CallContext, Call) -> BoxFuture<'static, Reply> + Send + 'a>),
}

impl<'a> Next<'a> {
    /// Wraps `next` with an interceptor.
    pub(crate) fn new(interceptor: &'a dyn Interceptor, next: Next<'a>) -> Self {
        Self {
            inner: NextInner::Chain {
                interceptor,
                next: Box::new(next),
            },
        }
    }

    /// A terminal continuation that invokes the handler.
    pub fn handler<F>(f: F) -> Self
    where
        F: FnOnce(&mut CallContext, Call) -> BoxFuture<'static, Reply> + Send + 'a,
    {
        Self {
            inner: NextInner::Handler(Box::new(f)),
        }
    }

    /// Runs the next stage, or the handler at the end of the chain.
    pub async fn run(self, ctx: &mut CallContext, call: Call) -> Reply {
        match self.inner {
            NextInner::Chain { interceptor, next } => {
                interceptor.intercept(ctx, call, *next).await
            }
            NextInner::Handler(handler) => handler(ctx, call).await,
        }
    }
}
