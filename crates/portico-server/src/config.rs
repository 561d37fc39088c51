//! Gateway listener configuration.
//!
//! # Example
//!
//! ```rust
//! use portico_server::GatewayConfig;
//! use std::time::Duration;
//!
//! let config = GatewayConfig::builder()
//!     .rpc_addr("127.0.0.1:0")
//!     .http_addr("127.0.0.1:0")
//!     .shutdown_timeout(Duration::from_secs(5))
//!     .build();
//!
//! assert_eq!(config.http_addr(), "127.0.0.1:0");
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{ServerError, ServerResult};

/// Default RPC bind address.
pub const DEFAULT_RPC_ADDR: &str = "0.0.0.0:50051";

/// Default HTTP bind address.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Default time the HTTP listener waits for in-flight requests on shutdown.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Listener settings for a [`Gateway`](crate::Gateway).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    rpc_addr: String,
    http_addr: String,
    shutdown_timeout: Duration,
    allowed_origins: Vec<String>,
}

impl GatewayConfig {
    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }

    /// Returns the RPC bind address.
    #[must_use]
    pub fn rpc_addr(&self) -> &str {
        &self.rpc_addr
    }

    /// Returns the HTTP bind address.
    #[must_use]
    pub fn http_addr(&self) -> &str {
        &self.http_addr
    }

    /// Returns the HTTP drain timeout.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Returns the CORS origins.
    #[must_use]
    pub fn allowed_origins(&self) -> &[String] {
        &self.allowed_origins
    }

    pub(crate) fn rpc_socket_addr(&self) -> ServerResult<SocketAddr> {
        parse_addr(&self.rpc_addr)
    }

    pub(crate) fn http_socket_addr(&self) -> ServerResult<SocketAddr> {
        parse_addr(&self.http_addr)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

fn parse_addr(addr: &str) -> ServerResult<SocketAddr> {
    addr.parse()
        .map_err(|e| ServerError::invalid_address(addr, e))
}

/// Builder for [`GatewayConfig`].
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct GatewayConfigBuilder {
    rpc_addr: Option<String>,
    http_addr: Option<String>,
    shutdown_timeout: Option<Duration>,
    allowed_origins: Option<Vec<String>>,
}

impl GatewayConfigBuilder {
    /// Sets the RPC bind address.
    pub fn rpc_addr(mut self, addr: impl Into<String>) -> Self {
        self.rpc_addr = Some(addr.into());
        self
    }

    /// Sets the HTTP bind address.
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addr = Some(addr.into());
        self
    }

    /// Sets the HTTP drain timeout.
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = Some(timeout);
        self
    }

    /// Sets the CORS origins. `"*"` allows any origin.
    pub fn allowed_origins<I, S>(mut self, origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_origins = Some(origins.into_iter().map(Into::into).collect());
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> GatewayConfig {
        GatewayConfig {
            rpc_addr: self.rpc_addr.unwrap_or_else(|| DEFAULT_RPC_ADDR.to_string()),
            http_addr: self
                .http_addr
                .unwrap_or_else(|| DEFAULT_HTTP_ADDR.to_string()),
            shutdown_timeout: self
                .shutdown_timeout
                .unwrap_or(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS)),
            allowed_origins: self
                .allowed_origins
                .unwrap_or_else(|| vec!["*".to_string()]),
        }
    }
}
