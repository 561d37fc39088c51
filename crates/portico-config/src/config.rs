//! Root configuration type.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::{
    AuthConfig, ConfigError, CorsConfig, RateLimitConfig, ServerConfig, StoreConfig,
    TelemetryConfigSection,
};

/// Complete Portico gateway configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and the
/// environment.
///
/// # Example
///
/// ```
/// use portico_config::PorticoConfig;
///
/// let config = PorticoConfig::default();
/// assert_eq!(config.rate_limit.capacity, 100);
/// assert!(config.validate().is_err()); // no signing secret yet
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct PorticoConfig {
    /// Listener configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Credential configuration.
    #[serde(default)]
    pub auth: AuthConfig,

    /// Admission control configuration.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Persistence configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// CORS configuration.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Logging and metrics configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfigSection,
}

impl PorticoConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_addr("server.rpc_addr", &self.server.rpc_addr)?;
        validate_addr("server.http_addr", &self.server.http_addr)?;

        if self.auth.signing_secret.is_empty() {
            return Err(ConfigError::invalid_value(
                "auth.signing_secret",
                "must not be empty",
            ));
        }
        if self.auth.session_days == 0 {
            return Err(ConfigError::invalid_value(
                "auth.session_days",
                "must be greater than 0",
            ));
        }
        if self.auth.session_days > portico_auth::MAX_SESSION_DAYS {
            return Err(ConfigError::invalid_value(
                "auth.session_days",
                format!("must be at most {}", portico_auth::MAX_SESSION_DAYS),
            ));
        }

        if self.rate_limit.capacity == 0 {
            return Err(ConfigError::invalid_value(
                "rate_limit.capacity",
                "must be greater than 0",
            ));
        }
        if !self.rate_limit.refill_per_second.is_finite() || self.rate_limit.refill_per_second < 0.0
        {
            return Err(ConfigError::invalid_value(
                "rate_limit.refill_per_second",
                "must be a non-negative number",
            ));
        }

        if self.store.max_attempts == 0 {
            return Err(ConfigError::invalid_value(
                "store.max_attempts",
                "must be greater than 0",
            ));
        }

        if self.telemetry.metrics.enabled {
            validate_addr("telemetry.metrics.addr", &self.telemetry.metrics.addr)?;
        }

        Ok(())
    }

    /// Logging settings in the form the telemetry crate installs.
    #[must_use]
    pub fn to_log_config(&self) -> portico_telemetry::LogConfig {
        let logging = &self.telemetry.logging;
        portico_telemetry::LogConfig {
            enabled: logging.enabled,
            level: logging.level.clone(),
            format: logging.format,
            ..portico_telemetry::LogConfig::default()
        }
    }

    /// Metrics settings in the form the telemetry crate installs.
    #[must_use]
    pub fn to_metrics_config(&self) -> portico_telemetry::MetricsConfig {
        portico_telemetry::MetricsConfig {
            enabled: self.telemetry.metrics.enabled,
            addr: self.telemetry.metrics.addr.clone(),
        }
    }

    /// Development preset: pretty debug logs and a throwaway secret.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.server.rpc_addr = "127.0.0.1:50051".to_string();
        config.server.http_addr = "127.0.0.1:8080".to_string();
        config.auth.signing_secret = "development-only-secret".to_string();
        config.telemetry.logging.level = "debug".to_string();
        config.telemetry.logging.format = portico_telemetry::LogFormat::Pretty;
        config
    }
}

fn validate_addr(field: &str, addr: &str) -> Result<(), ConfigError> {
    addr.parse::<SocketAddr>()
        .map(|_| ())
        .map_err(|_| ConfigError::invalid_value(field, format!("invalid socket address: {addr}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PorticoConfig {
        let mut config = PorticoConfig::default();
        config.auth.signing_secret = "s3cret".to_string();
        config
    }

    fn rejected_field(config: &PorticoConfig) -> String {
        match config.validate() {
            Err(ConfigError::InvalidValue { field, .. }) => field,
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn test_defaults_with_secret_are_valid() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_secret() {
        assert_eq!(rejected_field(&PorticoConfig::default()), "auth.signing_secret");
    }

    #[test]
    fn test_rejects_zero_values() {
        let mut config = valid();
        config.auth.session_days = 0;
        assert_eq!(rejected_field(&config), "auth.session_days");

        let mut config = valid();
        config.rate_limit.capacity = 0;
        assert_eq!(rejected_field(&config), "rate_limit.capacity");

        let mut config = valid();
        config.store.max_attempts = 0;
        assert_eq!(rejected_field(&config), "store.max_attempts");
    }

    #[test]
    fn test_rejects_unbounded_session() {
        let mut config = valid();
        config.auth.session_days = portico_auth::MAX_SESSION_DAYS;
        assert!(config.validate().is_ok());

        config.auth.session_days = u32::MAX;
        assert_eq!(rejected_field(&config), "auth.session_days");
    }

    #[test]
    fn test_rejects_negative_refill() {
        let mut config = valid();
        config.rate_limit.refill_per_second = -1.0;
        assert_eq!(rejected_field(&config), "rate_limit.refill_per_second");
    }

    #[test]
    fn test_rejects_bad_addresses() {
        let mut config = valid();
        config.server.rpc_addr = "localhost".to_string();
        assert_eq!(rejected_field(&config), "server.rpc_addr");

        let mut config = valid();
        config.telemetry.metrics.addr = "nope".to_string();
        assert!(config.validate().is_ok());
        config.telemetry.metrics.enabled = true;
        assert_eq!(rejected_field(&config), "telemetry.metrics.addr");
    }

    #[test]
    fn test_telemetry_conversion() {
        let config = PorticoConfig::development();
        let log = config.to_log_config();
        assert_eq!(log.level, "debug");
        assert_eq!(log.format, portico_telemetry::LogFormat::Pretty);
        assert!(!config.to_metrics_config().enabled);
        assert!(config.validate().is_ok());
    }
}
