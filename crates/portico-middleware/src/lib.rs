//! # Portico Middleware
//!
//! The fixed-order interceptor chain every call passes through before it
//! reaches a business handler, whichever transport it arrived on.
//!
//! ```text
//! RateLimit → RequestLog → Authorization → Validation → Cancellation → PanicRecovery → Handler
//! ```
//!
//! - [`Interceptor`] / [`Next`] - the stage contract and its continuation
//! - [`Pipeline`] - the assembled chain and its [`Pipeline::unary`] entry point
//! - [`stages`] - the six built-in stages and the shared [`TokenBucket`]

#![doc(html_root_url = "https://docs.rs/portico-middleware/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod interceptor;
mod pipeline;
pub mod stages;

pub use interceptor::{BoxFuture, Call, Interceptor, Next, Reply, API_KEY_HEADER};
pub use pipeline::{Pipeline, PipelineBuilder, Stage};
pub use stages::{
    AuthorizationStage, CancellationStage, PanicRecoveryStage, RateLimitStage, Rejected,
    RequestLogStage, TokenBucket, ValidationStage, PANIC_MESSAGE,
};
