//! # Portico Core
//!
//! Core types shared by every Portico crate.
//!
//! - [`GatewayError`] - The typed error taxonomy and its mapping onto RPC status codes
//! - [`CallContext`] - Per-call identity, cancellation signal and deadline
//! - [`RequestId`] - UUID v7 request identifier
//! - [`Identity`] / [`Role`] - The verified caller carried through the chain
//! - [`RequestMessage`] - The contract every request message implements
//! - [`Validator`] / [`FieldErrors`] - Declarative field rules with field-qualified messages

#![doc(html_root_url = "https://docs.rs/portico-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod context;
mod error;
mod identity;
mod message;
mod validate;

pub use context::{parse_grpc_timeout, CallContext, RequestId, GRPC_TIMEOUT_HEADER};
pub use error::{GatewayError, GatewayResult, RETRY_AFTER_METADATA};
pub use identity::{Identity, Role, RoleParseError};
pub use message::{AnyMessage, RequestMessage};
pub use validate::{FieldErrors, Validator};
