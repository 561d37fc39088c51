//! The contract a business service implements to be wired into a
//! [`Gateway`](crate::Gateway).

use portico_auth::AuthRequirement;
use tonic::service::RoutesBuilder;

use crate::dispatch::Dispatcher;
use crate::error::ServerResult;
use crate::transcode::HttpMux;

/// A business service exposed on both listeners.
///
/// The gateway collects [`routes`](Self::routes) from every registered
/// service into one route table, so a route name claimed twice fails startup.
/// Both registration hooks must route their calls through the given
/// [`Dispatcher`] or the mux, never around them.
pub trait ServiceRegistration: Send + Sync + 'static {
    /// Service name used in logs.
    fn name(&self) -> &'static str;

    /// Route names this service serves and the requirement of each.
    fn routes(&self) -> Vec<(&'static str, AuthRequirement)>;

    /// Adds the service's RPC server to `routes`.
    fn register_rpc(&self, dispatcher: &Dispatcher, routes: &mut RoutesBuilder);

    /// Binds the service's HTTP routes.
    ///
    /// # Errors
    ///
    /// Returns an error if a binding collides with an existing one.
    fn register_http(&self, mux: &mut HttpMux) -> ServerResult<()>;
}
