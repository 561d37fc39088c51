//! Account operations.
//!
//! Each operation runs after the interceptor chain: the caller is already
//! authorized for the route and the request already passed its field rules.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use portico_auth::CredentialCodec;
use portico_core::{CallContext, GatewayError, Role};
use portico_store::{Direction, Query, Scope, Store, StoreError};
use tonic::Status;

use crate::messages::MAX_PAGE_SIZE;
use crate::password::PasswordHash;
use crate::proto::{
    AuthResponse, CountUsersRequest, CountUsersResponse, DeleteUserRequest, DeleteUserResponse,
    GetUserRequest, ListUsersRequest, ListUsersResponse, LoginRequest, PingRequest, PingResponse,
    SignupRequest, UpdateUserRequest, User, WhoamiRequest,
};
use crate::record::UserRecord;

/// Page size used when `ListUsers` names none.
pub const DEFAULT_PAGE_SIZE: u64 = 20;

const LOGIN_FAILED: &str = "invalid email or password";

fn store_status(err: StoreError) -> Status {
    GatewayError::from(err).into()
}

/// The user-account service.
///
/// Cheap to clone; every handler takes the service by value so its future
/// owns everything it touches.
#[derive(Debug, Clone)]
pub struct UsersService<S> {
    store: S,
    codec: Arc<CredentialCodec>,
    admin_emails: Arc<HashSet<String>>,
}

impl<S: Store> UsersService<S> {
    /// Creates the service. Accounts signing up with an email in
    /// `admin_emails` get the admin role.
    pub fn new<I>(store: S, codec: Arc<CredentialCodec>, admin_emails: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        Self {
            store,
            codec,
            admin_emails: Arc::new(
                admin_emails
                    .into_iter()
                    .map(|e| normalize_email(&e))
                    .collect(),
            ),
        }
    }

    fn scoped(&self, ctx: &CallContext) -> S {
        self.store.with_context(Scope::from_call(ctx))
    }

    fn issue(&self, user: &UserRecord) -> Result<AuthResponse, Status> {
        let token = self
            .codec
            .issue(&user.id.to_string(), &user.display_name, user.role)
            .map_err(GatewayError::from)?;
        Ok(AuthResponse {
            token,
            user: Some(user.to_proto()),
        })
    }

    /// Liveness of the service behind the chain.
    pub async fn ping(self, _ctx: CallContext, _req: PingRequest) -> Result<PingResponse, Status> {
        Ok(PingResponse {
            message: "pong".to_string(),
        })
    }

    /// Creates an account and returns a credential for it.
    pub async fn signup(self, ctx: CallContext, req: SignupRequest) -> Result<AuthResponse, Status> {
        let email = normalize_email(&req.email);
        let role = if self.admin_emails.contains(&email) {
            Role::Admin
        } else {
            Role::Default
        };
        let record = UserRecord::new(
            email,
            req.display_name.trim().to_string(),
            role,
            &PasswordHash::new(&req.password),
            Utc::now().timestamp(),
        );

        let user = self.scoped(&ctx).create(record).await.map_err(store_status)?;
        tracing::info!(
            request_id = %ctx.request_id(),
            user_id = user.id,
            role = %user.role,
            "account created"
        );
        self.issue(&user)
    }

    /// Exchanges an email and password for a credential.
    pub async fn login(self, ctx: CallContext, req: LoginRequest) -> Result<AuthResponse, Status> {
        let query = Query::new().eq("email", normalize_email(&req.email));
        let user = match self.scoped(&ctx).first::<UserRecord>(&query).await {
            Ok(user) => user,
            Err(StoreError::NotFound { .. }) => {
                return Err(GatewayError::unauthenticated(LOGIN_FAILED).into())
            }
            Err(err) => return Err(store_status(err)),
        };

        if !user.password().verify(&req.password) {
            tracing::info!(request_id = %ctx.request_id(), user_id = user.id, "login rejected");
            return Err(GatewayError::unauthenticated(LOGIN_FAILED).into());
        }
        self.issue(&user)
    }

    /// Returns the caller's own account.
    pub async fn whoami(self, ctx: CallContext, _req: WhoamiRequest) -> Result<User, Status> {
        let id = ctx
            .identity()
            .and_then(|identity| identity.subject_id().parse::<u64>().ok())
            .ok_or_else(|| GatewayError::unauthenticated("authentication required"))?;
        self.load(&ctx, id).await
    }

    /// Returns an account by id.
    pub async fn get_user(self, ctx: CallContext, req: GetUserRequest) -> Result<User, Status> {
        self.load(&ctx, req.user_id).await
    }

    async fn load(&self, ctx: &CallContext, id: u64) -> Result<User, Status> {
        self.scoped(ctx)
            .first::<UserRecord>(&Query::by_id(id))
            .await
            .map(|user| user.to_proto())
            .map_err(store_status)
    }

    /// Renames an account.
    pub async fn update_user(self, ctx: CallContext, req: UpdateUserRequest) -> Result<User, Status> {
        let display_name = req.display_name.trim().to_string();
        let user = self
            .scoped(&ctx)
            .transaction(move |tx| async move {
                let mut user: UserRecord = tx.first(&Query::by_id(req.user_id)).await?;
                user.display_name = display_name;
                tx.update(&user).await
            })
            .await
            .map_err(store_status)?;
        Ok(user.to_proto())
    }

    /// Deletes an account.
    pub async fn delete_user(
        self,
        ctx: CallContext,
        req: DeleteUserRequest,
    ) -> Result<DeleteUserResponse, Status> {
        let removed = self
            .scoped(&ctx)
            .delete::<UserRecord>(&Query::by_id(req.user_id))
            .await
            .map_err(store_status)?;
        if removed == 0 {
            return Err(store_status(StoreError::not_found("users")));
        }
        tracing::info!(request_id = %ctx.request_id(), user_id = req.user_id, "account deleted");
        Ok(DeleteUserResponse { deleted: true })
    }

    /// Returns one page of accounts, oldest first.
    pub async fn list_users(
        self,
        ctx: CallContext,
        req: ListUsersRequest,
    ) -> Result<ListUsersResponse, Status> {
        let limit = match u64::from(req.limit) {
            0 => DEFAULT_PAGE_SIZE,
            n => n.min(MAX_PAGE_SIZE),
        };
        let query = Query::new()
            .order_by("id", Direction::Asc)
            .offset(req.offset as usize)
            .limit(limit as usize);

        let store = self.scoped(&ctx);
        let users: Vec<UserRecord> = store.find(&query).await.map_err(store_status)?;
        let total = store
            .count::<UserRecord>(&Query::new())
            .await
            .map_err(store_status)?;

        Ok(ListUsersResponse {
            users: users.iter().map(UserRecord::to_proto).collect(),
            total,
        })
    }

    /// Counts accounts.
    pub async fn count_users(
        self,
        ctx: CallContext,
        _req: CountUsersRequest,
    ) -> Result<CountUsersResponse, Status> {
        let count = self
            .scoped(&ctx)
            .count::<UserRecord>(&Query::new())
            .await
            .map_err(store_status)?;
        Ok(CountUsersResponse { count })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_core::Identity;
    use portico_store::{MemoryCatalog, MemoryStore};
    use tonic::Code;

    const URL: &str = "memory://users-test";

    fn service() -> UsersService<MemoryStore> {
        let catalog = MemoryCatalog::new();
        catalog.provision(URL).unwrap();
        UsersService::new(
            catalog.connect(URL).unwrap(),
            Arc::new(CredentialCodec::new(b"users-secret", 1)),
            vec!["Root@Example.com".to_string()],
        )
    }

    fn ctx() -> CallContext {
        CallContext::new("/portico.users.v1.Users/Test")
    }

    fn signup(email: &str) -> SignupRequest {
        SignupRequest {
            email: email.to_string(),
            password: "hunter2hunter2".to_string(),
            display_name: "Ann".to_string(),
        }
    }

    #[tokio::test]
    async fn test_signup_then_login() {
        let users = service();
        let created = users.clone().signup(ctx(), signup("ann@example.com")).await.unwrap();
        let user = created.user.unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.role, "default");
        assert!(!created.token.is_empty());

        let login = users
            .clone()
            .login(
                ctx(),
                LoginRequest {
                    email: " ANN@example.com".to_string(),
                    password: "hunter2hunter2".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(login.user.unwrap().id, 1);

        let err = users
            .login(
                ctx(),
                LoginRequest {
                    email: "ann@example.com".to_string(),
                    password: "wrong-password".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);
    }

    #[tokio::test]
    async fn test_duplicate_email_already_exists() {
        let users = service();
        users.clone().signup(ctx(), signup("ann@example.com")).await.unwrap();
        let err = users.signup(ctx(), signup("Ann@Example.com")).await.unwrap_err();
        assert_eq!(err.code(), Code::AlreadyExists);
        assert_eq!(err.message(), "email already in use");
    }

    #[tokio::test]
    async fn test_admin_emails_get_admin_role() {
        let created = service().signup(ctx(), signup("root@example.com")).await.unwrap();
        assert_eq!(created.user.unwrap().role, "admin");
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let users = service();
        users.clone().signup(ctx(), signup("ann@example.com")).await.unwrap();

        let renamed = users
            .clone()
            .update_user(
                ctx(),
                UpdateUserRequest {
                    user_id: 1,
                    display_name: " Annie ".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(renamed.display_name, "Annie");

        users
            .clone()
            .delete_user(ctx(), DeleteUserRequest { user_id: 1 })
            .await
            .unwrap();
        let err = users
            .clone()
            .get_user(ctx(), GetUserRequest { user_id: 1 })
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);

        let err = users
            .delete_user(ctx(), DeleteUserRequest { user_id: 1 })
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_list_pages_and_counts() {
        let users = service();
        for n in 0..5 {
            users
                .clone()
                .signup(ctx(), signup(&format!("user{n}@example.com")))
                .await
                .unwrap();
        }

        let page = users
            .clone()
            .list_users(ctx(), ListUsersRequest { offset: 1, limit: 2 })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.users.iter().map(|u| u.id).collect::<Vec<_>>(), [2, 3]);

        let count = users
            .count_users(ctx(), CountUsersRequest {})
            .await
            .unwrap();
        assert_eq!(count.count, 5);
    }

    #[tokio::test]
    async fn test_whoami_uses_injected_identity() {
        let users = service();
        users.clone().signup(ctx(), signup("ann@example.com")).await.unwrap();

        let mut call = ctx();
        call.set_identity(Identity::new("1", "Ann", Role::Default));
        let me = users.clone().whoami(call, WhoamiRequest {}).await.unwrap();
        assert_eq!(me.email, "ann@example.com");

        let err = users.whoami(ctx(), WhoamiRequest {}).await.unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);
    }

    #[tokio::test]
    async fn test_cancelled_call_stops_at_store() {
        let users = service();
        let call = ctx();
        call.cancellation().cancel();
        let err = users.signup(call, signup("ann@example.com")).await.unwrap_err();
        assert_eq!(err.code(), Code::Cancelled);
    }
}
