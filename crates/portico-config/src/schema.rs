//! Configuration sections.

use portico_telemetry::LogFormat;
use serde::{Deserialize, Serialize};

/// Listener settings.
///
/// # Example
///
/// ```
/// use portico_config::ServerConfig;
///
/// let config = ServerConfig::default();
/// assert_eq!(config.rpc_addr, "0.0.0.0:50051");
/// assert_eq!(config.http_addr, "0.0.0.0:8080");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// RPC listener bind address.
    #[serde(default = "default_rpc_addr")]
    pub rpc_addr: String,

    /// HTTP/JSON listener bind address.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// How long the HTTP listener drains in-flight requests on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            rpc_addr: default_rpc_addr(),
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

fn default_rpc_addr() -> String {
    "0.0.0.0:50051".to_string()
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

/// Credential and api-key settings.
///
/// The signing secret has no default; loading fails until one is provided.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Shared HMAC secret used to sign and verify credentials.
    #[serde(default)]
    pub signing_secret: String,

    /// Credential lifetime in days.
    #[serde(default = "default_session_days")]
    pub session_days: u32,

    /// Static key accepted on api-key routes. Empty disables those routes.
    #[serde(default)]
    pub api_key: String,

    /// Accounts created with one of these emails receive the admin role.
    #[serde(default)]
    pub admin_emails: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            signing_secret: String::new(),
            session_days: default_session_days(),
            api_key: String::new(),
            admin_emails: Vec::new(),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("signing_secret", &"<redacted>")
            .field("session_days", &self.session_days)
            .field("api_key", &"<redacted>")
            .field("admin_emails", &self.admin_emails)
            .finish()
    }
}

fn default_session_days() -> u32 {
    7
}

/// Token-bucket admission settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Bucket size.
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// Tokens added per second. Zero never refills.
    #[serde(default = "default_refill")]
    pub refill_per_second: f64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_per_second: default_refill(),
        }
    }
}

fn default_capacity() -> u32 {
    100
}

fn default_refill() -> f64 {
    50.0
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Database URL.
    #[serde(default = "default_store_url")]
    pub url: String,

    /// Connection attempts before startup gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_store_url() -> String {
    "memory://portico".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

/// CORS settings for the HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins. `"*"` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (e.g. "info", "portico=debug,tonic=warn").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Prometheus exporter configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Start the exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Exporter listen address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

/// Telemetry section.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfigSection {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_true() -> bool {
    true
}
