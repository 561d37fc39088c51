//! Wiring from configuration to a bound gateway.

use std::sync::Arc;
use std::time::Duration;

use portico_auth::{AuthorizationEngine, CredentialCodec};
use portico_config::{PorticoConfig, StoreConfig};
use portico_middleware::TokenBucket;
use portico_server::{acquire_with_retry, Gateway, GatewayConfig, ServerResult};
use portico_store::{MemoryCatalog, MemoryStore, StoreResult};
use portico_users::UsersService;

/// Listener settings from the `server` and `cors` sections.
#[must_use]
pub fn gateway_config(config: &PorticoConfig) -> GatewayConfig {
    GatewayConfig::builder()
        .rpc_addr(config.server.rpc_addr.clone())
        .http_addr(config.server.http_addr.clone())
        .shutdown_timeout(Duration::from_secs(config.server.shutdown_timeout_secs))
        .allowed_origins(config.cors.allowed_origins.iter().cloned())
        .build()
}

/// Connects to the configured database, provisioning it between attempts.
///
/// Gives up after `max_attempts`; the caller treats that as fatal.
pub async fn connect_store(catalog: &MemoryCatalog, config: &StoreConfig) -> StoreResult<MemoryStore> {
    acquire_with_retry(
        move || async move { catalog.connect(&config.url) },
        move || async move {
            if let Err(error) = catalog.provision(&config.url) {
                tracing::warn!(%error, url = %config.url, "provisioning failed");
            }
        },
        config.max_attempts,
    )
    .await
}

/// Builds the chain and the users service and binds both listeners.
pub async fn assemble(config: &PorticoConfig, store: MemoryStore) -> ServerResult<Gateway> {
    let codec = Arc::new(CredentialCodec::new(
        config.auth.signing_secret.as_bytes(),
        config.auth.session_days,
    ));

    let mut engine = AuthorizationEngine::new();
    if !config.auth.api_key.is_empty() {
        engine = engine.with_api_key(config.auth.api_key.clone());
    }

    let bucket = Arc::new(TokenBucket::new(
        config.rate_limit.capacity,
        config.rate_limit.refill_per_second,
    ));

    let users = UsersService::new(
        store,
        Arc::clone(&codec),
        config.auth.admin_emails.iter().cloned(),
    );

    Gateway::builder(gateway_config(config), codec)
        .engine(engine)
        .rate_limiter(bucket)
        .service(Arc::new(users))
        .bind()
        .await
}
