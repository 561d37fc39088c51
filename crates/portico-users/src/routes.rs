//! Route names, requirements and HTTP bindings.

use http::Method;
use portico_auth::AuthRequirement;
use portico_server::{Dispatcher, HttpMux, ServerResult, ServiceRegistration};
use portico_store::Store;
use tonic::service::RoutesBuilder;

use crate::proto::users_server::UsersServer;
use crate::rpc::UsersRpc;
use crate::service::UsersService;

/// Full RPC method paths.
pub mod methods {
    /// `Ping`
    pub const PING: &str = "/portico.users.v1.Users/Ping";
    /// `Signup`
    pub const SIGNUP: &str = "/portico.users.v1.Users/Signup";
    /// `Login`
    pub const LOGIN: &str = "/portico.users.v1.Users/Login";
    /// `Whoami`
    pub const WHOAMI: &str = "/portico.users.v1.Users/Whoami";
    /// `GetUser`
    pub const GET_USER: &str = "/portico.users.v1.Users/GetUser";
    /// `UpdateUser`
    pub const UPDATE_USER: &str = "/portico.users.v1.Users/UpdateUser";
    /// `DeleteUser`
    pub const DELETE_USER: &str = "/portico.users.v1.Users/DeleteUser";
    /// `ListUsers`
    pub const LIST_USERS: &str = "/portico.users.v1.Users/ListUsers";
    /// `CountUsers`
    pub const COUNT_USERS: &str = "/portico.users.v1.Users/CountUsers";
}

/// Route name to requirement, one row per RPC method.
pub const ROUTES: [(&str, AuthRequirement); 9] = [
    ("Ping", AuthRequirement::Public),
    ("Signup", AuthRequirement::Public),
    ("Login", AuthRequirement::Public),
    ("Whoami", AuthRequirement::AuthenticatedUser),
    ("GetUser", AuthRequirement::SelfOnly),
    ("UpdateUser", AuthRequirement::SelfOnly),
    ("DeleteUser", AuthRequirement::SelfOnly),
    ("ListUsers", AuthRequirement::Admin),
    ("CountUsers", AuthRequirement::ApiKey),
];

macro_rules! bind {
    ($mux:ident, $service:expr, $verb:expr, $path:literal, $method:expr, $op:ident) => {{
        let service = $service.clone();
        $mux.route($verb, $path, $method, move |ctx, req| {
            service.clone().$op(ctx, req)
        })?;
    }};
}

impl<S: Store> ServiceRegistration for UsersService<S> {
    fn name(&self) -> &'static str {
        "users"
    }

    fn routes(&self) -> Vec<(&'static str, AuthRequirement)> {
        ROUTES.to_vec()
    }

    fn register_rpc(&self, dispatcher: &Dispatcher, routes: &mut RoutesBuilder) {
        routes.add_service(UsersServer::new(UsersRpc::new(
            self.clone(),
            dispatcher.clone(),
        )));
    }

    fn register_http(&self, mux: &mut HttpMux) -> ServerResult<()> {
        bind!(mux, self, Method::GET, "/v1/ping", methods::PING, ping);
        bind!(mux, self, Method::POST, "/v1/users", methods::SIGNUP, signup);
        bind!(mux, self, Method::POST, "/v1/login", methods::LOGIN, login);
        bind!(mux, self, Method::GET, "/v1/whoami", methods::WHOAMI, whoami);
        bind!(mux, self, Method::GET, "/v1/users/{user_id}", methods::GET_USER, get_user);
        bind!(mux, self, Method::POST, "/v1/users/{user_id}", methods::UPDATE_USER, update_user);
        bind!(mux, self, Method::POST, "/v1/users/{user_id}/delete", methods::DELETE_USER, delete_user);
        bind!(mux, self, Method::GET, "/v1/users", methods::LIST_USERS, list_users);
        bind!(mux, self, Method::GET, "/v1/internal/users/count", methods::COUNT_USERS, count_users);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_auth::route_name_from_rpc_method;

    #[test]
    fn test_every_method_has_a_route() {
        let names: Vec<&str> = [
            methods::PING,
            methods::SIGNUP,
            methods::LOGIN,
            methods::WHOAMI,
            methods::GET_USER,
            methods::UPDATE_USER,
            methods::DELETE_USER,
            methods::LIST_USERS,
            methods::COUNT_USERS,
        ]
        .into_iter()
        .map(route_name_from_rpc_method)
        .collect();
        let routes: Vec<&str> = ROUTES.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, routes);
    }
}
