//! RPC transport binding.

use portico_server::Dispatcher;
use portico_store::Store;
use tonic::{Request, Response, Status};

use crate::proto::users_server::Users;
use crate::proto::{
    AuthResponse, CountUsersRequest, CountUsersResponse, DeleteUserRequest, DeleteUserResponse,
    GetUserRequest, ListUsersRequest, ListUsersResponse, LoginRequest, PingRequest, PingResponse,
    SignupRequest, UpdateUserRequest, User, WhoamiRequest,
};
use crate::routes::methods;
use crate::service::UsersService;

/// Generated-server adapter that sends every call through the dispatcher.
#[derive(Debug, Clone)]
pub struct UsersRpc<S> {
    service: UsersService<S>,
    dispatcher: Dispatcher,
}

impl<S: Store> UsersRpc<S> {
    /// Wraps `service` behind `dispatcher`.
    pub fn new(service: UsersService<S>, dispatcher: Dispatcher) -> Self {
        Self {
            service,
            dispatcher,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $method:expr, $request:ident, $op:ident) => {{
        let service = $self.service.clone();
        $self
            .dispatcher
            .rpc($method, $request, move |ctx, req| service.$op(ctx, req))
            .await
    }};
}

#[tonic::async_trait]
impl<S: Store> Users for UsersRpc<S> {
    async fn ping(&self, request: Request<PingRequest>) -> Result<Response<PingResponse>, Status> {
        dispatch!(self, methods::PING, request, ping)
    }

    async fn signup(&self, request: Request<SignupRequest>) -> Result<Response<AuthResponse>, Status> {
        dispatch!(self, methods::SIGNUP, request, signup)
    }

    async fn login(&self, request: Request<LoginRequest>) -> Result<Response<AuthResponse>, Status> {
        dispatch!(self, methods::LOGIN, request, login)
    }

    async fn whoami(&self, request: Request<WhoamiRequest>) -> Result<Response<User>, Status> {
        dispatch!(self, methods::WHOAMI, request, whoami)
    }

    async fn get_user(&self, request: Request<GetUserRequest>) -> Result<Response<User>, Status> {
        dispatch!(self, methods::GET_USER, request, get_user)
    }

    async fn update_user(
        &self,
        request: Request<UpdateUserRequest>,
    ) -> Result<Response<User>, Status> {
        dispatch!(self, methods::UPDATE_USER, request, update_user)
    }

    async fn delete_user(
        &self,
        request: Request<DeleteUserRequest>,
    ) -> Result<Response<DeleteUserResponse>, Status> {
        dispatch!(self, methods::DELETE_USER, request, delete_user)
    }

    async fn list_users(
        &self,
        request: Request<ListUsersRequest>,
    ) -> Result<Response<ListUsersResponse>, Status> {
        dispatch!(self, methods::LIST_USERS, request, list_users)
    }

    async fn count_users(
        &self,
        request: Request<CountUsersRequest>,
    ) -> Result<Response<CountUsersResponse>, Status> {
        dispatch!(self, methods::COUNT_USERS, request, count_users)
    }
}
