//! # Portico Auth
//!
//! Per-route authorization for the Portico gateway.
//!
//! - [`RouteTable`] - route name to [`AuthRequirement`], failing closed on unmapped names
//! - [`CredentialCodec`] - signed, time-bound bearer credentials
//! - [`AuthorizationEngine`] - the ALLOW/DENY decision per requirement
//!
//! # Example
//!
//! ```
//! use portico_auth::{AuthInput, AuthRequirement, AuthorizationEngine, CredentialCodec};
//! use portico_core::Role;
//!
//! let codec = CredentialCodec::new(b"secret", 1);
//! let token = codec.issue("7", "ann", Role::Default)?;
//! let identity = codec.verify(&token)?.identity();
//!
//! let decision = AuthorizationEngine::new().decide(&AuthInput {
//!     route: "GetUser",
//!     requirement: AuthRequirement::SelfOnly,
//!     identity: Some(&identity),
//!     owner_id: Some("7"),
//!     api_key: None,
//! });
//! assert!(decision.allow);
//! # Ok::<(), portico_auth::CredentialError>(())
//! ```

#![doc(html_root_url = "https://docs.rs/portico-auth/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod credential;
mod engine;
mod routes;

pub use credential::{
    extract_bearer, Claims, Credential, CredentialCodec, CredentialError, BEARER_PREFIX,
    MAX_SESSION_DAYS,
};
pub use engine::{AuthInput, AuthorizationEngine, Decision, DecisionReason};
pub use routes::{route_name_from_rpc_method, AuthRequirement, RouteError, RouteTable};
