//! # Portico
//!
//! A request gateway that serves business services on an RPC listener and an
//! HTTP/JSON listener at once, running every call through one fixed
//! interceptor chain:
//!
//! ```text
//! RateLimit → RequestLog → Authorization → Validation → Cancellation → PanicRecovery → Handler
//! ```
//!
//! Errors leave the chain as typed RPC statuses; the HTTP edge translates
//! them into a status code and a `{"error": "..."}` body.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use portico::prelude::*;
//!
//! let config = ConfigLoader::new().with_defaults().with_env_prefix("PORTICO").load()?;
//! let catalog = MemoryCatalog::new();
//! let store = portico::connect_store(&catalog, &config.store).await?;
//! let gateway = portico::assemble(&config, store).await?;
//! gateway.serve(ShutdownSignal::with_os_signals()?).await?;
//! ```

#![doc(html_root_url = "https://docs.rs/portico/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;

pub use app::{assemble, connect_store, gateway_config};

pub use portico_auth as auth;
pub use portico_config as config;
pub use portico_core as core;
pub use portico_middleware as middleware;
pub use portico_server as server;
pub use portico_store as store;
pub use portico_telemetry as telemetry;
pub use portico_users as users;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use portico_auth::{AuthRequirement, AuthorizationEngine, CredentialCodec, RouteTable};
    pub use portico_config::{ConfigLoader, PorticoConfig};
    pub use portico_core::{
        CallContext, GatewayError, GatewayResult, Identity, RequestMessage, Role, Validator,
    };
    pub use portico_middleware::{Pipeline, TokenBucket};
    pub use portico_server::{
        acquire_with_retry, Gateway, GatewayConfig, HttpMux, ServiceRegistration, ShutdownSignal,
    };
    pub use portico_store::{MemoryCatalog, MemoryStore, Query, Record, Store};
    pub use portico_users::UsersService;
}
