//! # Portico Users
//!
//! Reference business service for the Portico gateway: account signup,
//! login, lookup, rename, delete, listing and counting, served on both the
//! RPC and HTTP listeners through the shared interceptor chain.
//!
//! | RPC method | HTTP binding | Requirement |
//! |---|---|---|
//! | `Ping` | `GET /v1/ping` | public |
//! | `Signup` | `POST /v1/users` | public |
//! | `Login` | `POST /v1/login` | public |
//! | `Whoami` | `GET /v1/whoami` | authenticated user |
//! | `GetUser` | `GET /v1/users/{user_id}` | self |
//! | `UpdateUser` | `POST /v1/users/{user_id}` | self |
//! | `DeleteUser` | `POST /v1/users/{user_id}/delete` | self |
//! | `ListUsers` | `GET /v1/users` | admin |
//! | `CountUsers` | `GET /v1/internal/users/count` | api key |
//!
//! # Example
//!
//! ```rust,ignore
//! let users = UsersService::new(store, codec.clone(), config.auth.admin_emails.clone());
//! let gateway = Gateway::builder(gateway_config, codec)
//!     .service(Arc::new(users))
//!     .bind()
//!     .await?;
//! ```

#![doc(html_root_url = "https://docs.rs/portico-users/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod messages;
mod password;
mod record;
mod routes;
mod rpc;
mod service;

/// Generated protobuf types and RPC stubs.
#[allow(missing_docs, clippy::all, clippy::pedantic, clippy::nursery)]
pub mod proto {
    tonic::include_proto!("portico.users.v1");
}

pub use messages::MAX_PAGE_SIZE;
pub use password::PasswordHash;
pub use record::UserRecord;
pub use routes::{methods, ROUTES};
pub use rpc::UsersRpc;
pub use service::{UsersService, DEFAULT_PAGE_SIZE};
