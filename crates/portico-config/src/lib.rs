//! Typed configuration for the Portico gateway.
//!
//! - TOML and JSON files
//! - `PORTICO__SECTION__KEY` environment overrides and `.env` files
//! - Strict parsing: unknown fields are errors
//! - Validation of secrets, limits and addresses before anything starts
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! rpc_addr = "0.0.0.0:50051"
//! http_addr = "0.0.0.0:8080"
//! shutdown_timeout_secs = 30
//!
//! [auth]
//! signing_secret = "change-me"
//! session_days = 7
//! api_key = "internal-key"
//! admin_emails = ["root@example.com"]
//!
//! [rate_limit]
//! capacity = 100
//! refill_per_second = 50.0
//!
//! [store]
//! url = "memory://portico"
//! max_attempts = 5
//!
//! [cors]
//! allowed_origins = ["*"]
//!
//! [telemetry.logging]
//! level = "info"
//! format = "json"
//!
//! [telemetry.metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```

#![doc(html_root_url = "https://docs.rs/portico-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::PorticoConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
