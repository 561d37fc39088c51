//! # Portico Server
//!
//! The dual-protocol gateway: one RPC listener and one HTTP/JSON listener,
//! both running every call through the same interceptor chain.
//!
//! - [`Gateway`] - binds both listeners over the registered services
//! - [`HttpMux`] / [`HttpEdge`] - HTTP to RPC transcoding and the HTTP edge
//! - [`ErrorTranslator`] - RPC status to HTTP status and error body
//! - [`ShutdownSignal`] - graceful shutdown shared by both listeners
//! - [`acquire_with_retry`] - startup resource acquisition with backoff
//!
//! # Example
//!
//! ```rust,ignore
//! use portico_server::{Gateway, GatewayConfig, ShutdownSignal};
//!
//! let gateway = Gateway::builder(GatewayConfig::default(), codec)
//!     .service(users)
//!     .bind()
//!     .await?;
//! gateway.serve(ShutdownSignal::with_os_signals()?).await?;
//! ```

#![doc(html_root_url = "https://docs.rs/portico-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod bootstrap;
mod config;
mod cors;
mod dispatch;
mod error;
mod gateway;
mod headers;
mod registration;
mod rpc;
mod shutdown;
mod transcode;
mod translate;

pub use bootstrap::acquire_with_retry;
pub use config::{
    GatewayConfig, GatewayConfigBuilder, DEFAULT_HTTP_ADDR, DEFAULT_RPC_ADDR,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
pub use cors::CorsPolicy;
pub use dispatch::Dispatcher;
pub use error::{ServerError, ServerResult};
pub use gateway::{
    Gateway, GatewayBuilder, DEFAULT_RATE_CAPACITY, DEFAULT_RATE_REFILL_PER_SECOND,
};
pub use headers::{
    apply_security_headers, strip_transport_headers, LEAKED_CONTENT_TYPE_HEADER,
    REQUEST_ID_HEADER,
};
pub use registration::ServiceRegistration;
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
pub use transcode::{HttpEdge, HttpMux, HttpResponse, ResponseBody, HEALTH_PATH, MAX_BODY_BYTES};
pub use translate::{
    standard_http_status, BodyPolicy, ErrorEnvelope, ErrorTranslator, Translated,
    UNAUTHENTICATED_MESSAGE,
};
