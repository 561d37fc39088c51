//! Gateway assembly.
//!
//! A [`Gateway`] owns both listeners. [`GatewayBuilder::bind`] builds the
//! route table from every registered service, builds the standard chain,
//! lets each service register on both transports and binds the sockets.
//! [`Gateway::serve`] runs both listeners until the shutdown signal fires.

use std::net::SocketAddr;
use std::sync::Arc;

use portico_auth::{AuthorizationEngine, CredentialCodec, RouteTable};
use portico_middleware::{AuthorizationStage, Pipeline, RateLimitStage, TokenBucket};
use tokio::net::TcpListener;
use tonic::service::{Routes, RoutesBuilder};

use crate::config::GatewayConfig;
use crate::cors::CorsPolicy;
use crate::dispatch::Dispatcher;
use crate::error::{ServerError, ServerResult};
use crate::transcode::{serve_http, HttpEdge, HttpMux};
use crate::registration::ServiceRegistration;
use crate::rpc::serve_rpc;
use crate::shutdown::ShutdownSignal;

/// Default rate budget capacity when none is configured.
pub const DEFAULT_RATE_CAPACITY: u32 = 100;

/// Default rate budget refill, in tokens per second.
pub const DEFAULT_RATE_REFILL_PER_SECOND: f64 = 50.0;

/// Builder for a [`Gateway`].
///
/// # Example
///
/// ```rust,ignore
/// let gateway = Gateway::builder(config, Arc::new(CredentialCodec::new(secret, 7)))
///     .engine(AuthorizationEngine::new().with_api_key(api_key))
///     .rate_limiter(Arc::new(TokenBucket::new(100, 50.0)))
///     .service(Arc::new(users))
///     .bind()
///     .await?;
///
/// gateway.serve(ShutdownSignal::with_os_signals()?).await?;
/// ```
#[must_use]
pub struct GatewayBuilder {
    config: GatewayConfig,
    codec: Arc<CredentialCodec>,
    engine: AuthorizationEngine,
    rate_limiter: Arc<TokenBucket>,
    services: Vec<Arc<dyn ServiceRegistration>>,
}

impl std::fmt::Debug for GatewayBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayBuilder")
            .field("config", &self.config)
            .field(
                "services",
                &self.services.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl GatewayBuilder {
    /// Sets the authorization engine.
    pub fn engine(mut self, engine: AuthorizationEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the shared rate budget.
    pub fn rate_limiter(mut self, bucket: Arc<TokenBucket>) -> Self {
        self.rate_limiter = bucket;
        self
    }

    /// Registers a business service.
    pub fn service(mut self, service: Arc<dyn ServiceRegistration>) -> Self {
        self.services.push(service);
        self
    }

    /// Assembles the chain and binds both listeners.
    ///
    /// # Errors
    ///
    /// Fails if two services claim the same route name or HTTP binding, if an
    /// address is malformed, or if a listener cannot bind.
    pub async fn bind(self) -> ServerResult<Gateway> {
        let mut routes = RouteTable::new();
        for service in &self.services {
            for (name, requirement) in service.routes() {
                routes.insert(name, requirement)?;
            }
        }
        let routes = Arc::new(routes);

        let pipeline = Pipeline::standard(
            RateLimitStage::new(self.rate_limiter),
            AuthorizationStage::new(Arc::clone(&routes), self.codec, self.engine),
        );
        let dispatcher = Dispatcher::new(Arc::new(pipeline));

        let mut rpc_routes = RoutesBuilder::default();
        let mut mux = HttpMux::new();
        for service in &self.services {
            service.register_rpc(&dispatcher, &mut rpc_routes);
            service.register_http(&mut mux)?;
            tracing::debug!(service = service.name(), "service registered");
        }

        let cors = CorsPolicy::new(self.config.allowed_origins().iter().cloned());
        let edge = Arc::new(HttpEdge::new(mux, dispatcher.clone(), cors));

        let rpc_listener = bind(self.config.rpc_socket_addr()?).await?;
        let http_listener = bind(self.config.http_socket_addr()?).await?;

        let gateway = Gateway {
            rpc_addr: rpc_listener.local_addr()?,
            http_addr: http_listener.local_addr()?,
            config: self.config,
            routes,
            dispatcher,
            rpc_routes: rpc_routes.routes(),
            edge,
            rpc_listener,
            http_listener,
        };
        tracing::info!(
            rpc_addr = %gateway.rpc_addr,
            http_addr = %gateway.http_addr,
            routes = gateway.routes.len(),
            "gateway bound"
        );
        Ok(gateway)
    }
}

async fn bind(addr: SocketAddr) -> ServerResult<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

/// A bound gateway, ready to serve.
pub struct Gateway {
    config: GatewayConfig,
    routes: Arc<RouteTable>,
    dispatcher: Dispatcher,
    rpc_routes: Routes,
    edge: Arc<HttpEdge>,
    rpc_listener: TcpListener,
    http_listener: TcpListener,
    rpc_addr: SocketAddr,
    http_addr: SocketAddr,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("rpc_addr", &self.rpc_addr)
            .field("http_addr", &self.http_addr)
            .field("routes", &self.routes.len())
            .finish_non_exhaustive()
    }
}

impl Gateway {
    /// Creates a builder. The codec verifies every bearer credential.
    pub fn builder(config: GatewayConfig, codec: Arc<CredentialCodec>) -> GatewayBuilder {
        GatewayBuilder {
            config,
            codec,
            engine: AuthorizationEngine::new(),
            rate_limiter: Arc::new(TokenBucket::new(
                DEFAULT_RATE_CAPACITY,
                DEFAULT_RATE_REFILL_PER_SECOND,
            )),
            services: Vec::new(),
        }
    }

    /// Returns the bound RPC address.
    #[must_use]
    pub fn rpc_addr(&self) -> SocketAddr {
        self.rpc_addr
    }

    /// Returns the bound HTTP address.
    #[must_use]
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Returns the assembled route table.
    #[must_use]
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Returns the shared dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Serves both listeners until `shutdown` fires.
    ///
    /// On shutdown both listeners stop accepting, calls that have not reached
    /// a handler are cancelled, the RPC listener waits for in-flight calls and
    /// the HTTP listener drains for at most the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns the first listener failure. The other listener is stopped.
    pub async fn serve(self, shutdown: ShutdownSignal) -> ServerResult<()> {
        let cancel = self.dispatcher.shutdown_token().clone();
        let cancel_on_shutdown = {
            let shutdown = shutdown.clone();
            async move {
                shutdown.recv().await;
                cancel.cancel();
                Ok::<_, ServerError>(())
            }
        };

        let rpc = serve_rpc(self.rpc_listener, self.rpc_routes, shutdown.clone());
        let http = serve_http(
            self.http_listener,
            self.edge,
            shutdown.clone(),
            self.config.shutdown_timeout(),
        );

        let result = tokio::try_join!(cancel_on_shutdown, rpc, http);
        if let Err(error) = &result {
            tracing::error!(%error, "gateway listener failed");
            shutdown.trigger();
        }
        result.map(|_| ())
    }
}
