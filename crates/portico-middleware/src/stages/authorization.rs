//! Credential verification and authorization.
//!
//! Resolves the route's requirement, verifies the bearer credential when one
//! is presented, asks the [`AuthorizationEngine`] for a decision and, on
//! ALLOW, injects the caller's identity into the call context.
//!
//! A credential that fails verification is an `Unauthenticated` error on every
//! route except `Public` ones, where the call proceeds anonymously.

use std::sync::Arc;

use http::header::AUTHORIZATION;
use portico_auth::{AuthInput, AuthRequirement, AuthorizationEngine, CredentialCodec, RouteTable};
use portico_core::{CallContext, GatewayError};

use crate::interceptor::{BoxFuture, Call, Interceptor, Next, Reply, API_KEY_HEADER};
use crate::pipeline::Stage;

/// Stage 3: credential verification and the per-route decision.
#[derive(Debug, Clone)]
pub struct AuthorizationStage {
    routes: Arc<RouteTable>,
    codec: Arc<CredentialCodec>,
    engine: AuthorizationEngine,
}

impl AuthorizationStage {
    /// Creates the stage.
    pub fn new(
        routes: Arc<RouteTable>,
        codec: Arc<CredentialCodec>,
        engine: AuthorizationEngine,
    ) -> Self {
        Self {
            routes,
            codec,
            engine,
        }
    }

    /// Returns the route table.
    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }
}

impl Interceptor for AuthorizationStage {
    fn stage(&self) -> Stage {
        Stage::Authorization
    }

    fn intercept<'a>(
        &'a self,
        ctx: &'a mut CallContext,
        call: Call,
        next: Next<'a>,
    ) -> BoxFuture<'a, Reply> {
        Box::pin(async move {
            let route = ctx.route().to_string();
            if route.is_empty() {
                return Err(GatewayError::unknown("call does not name a route").into());
            }
            let requirement = self.routes.requirement_for(&route);

            let identity = match call.header(AUTHORIZATION.as_str()) {
                None => None,
                Some(header) => match self.codec.verify_bearer(Some(header)) {
                    Ok(credential) => Some(credential.identity()),
                    Err(err) if requirement == AuthRequirement::Public => {
                        tracing::debug!(
                            request_id = %ctx.request_id(),
                            route = %route,
                            reason = err.reason(),
                            "ignoring invalid credential on public route"
                        );
                        None
                    }
                    Err(err) => {
                        tracing::info!(
                            request_id = %ctx.request_id(),
                            route = %route,
                            reason = err.reason(),
                            "credential rejected"
                        );
                        portico_telemetry::record_authz_denied(&route, err.reason());
                        return Err(GatewayError::from(err).into());
                    }
                },
            };

            let owner_id = call.message().owner_id();
            let decision = self.engine.decide(&AuthInput {
                route: &route,
                requirement,
                identity: identity.as_ref(),
                owner_id: owner_id.as_deref(),
                api_key: call.header(API_KEY_HEADER),
            });

            if let Err(err) = decision.into_result() {
                tracing::info!(
                    request_id = %ctx.request_id(),
                    route = %route,
                    requirement = %requirement,
                    reason = %decision.reason,
                    subject = identity.as_ref().map(|i| i.log_id()),
                    "call denied"
                );
                portico_telemetry::record_authz_denied(&route, decision.reason.as_str());
                return Err(err.into());
            }

            if let Some(identity) = identity {
                ctx.set_identity(identity);
            }
            next.run(ctx, call).await
        })
    }
}
