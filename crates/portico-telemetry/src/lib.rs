//! # Portico Telemetry
//!
//! Structured logging and Prometheus metrics for the Portico gateway.
//!
//! - **Logging**: `tracing-subscriber` with an `EnvFilter` and a JSON or pretty layer
//! - **Metrics**: `metrics` facade with a `metrics-exporter-prometheus` scrape listener
//!
//! Both are installed once at process start by [`init_telemetry`] and then
//! used through the `tracing` macros and the `record_*` helpers.
//!
//! # Example
//!
//! ```rust,ignore
//! use portico_telemetry::{init_telemetry, LogConfig, MetricsConfig};
//!
//! init_telemetry(&LogConfig::default(), &MetricsConfig::default())?;
//! ```

#![doc(html_root_url = "https://docs.rs/portico-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{
    init_metrics, record_authz_denied, record_panic, record_rate_limited, record_request,
    MetricsConfig,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Installs logging first, then metrics.
pub fn init_telemetry(logging: &LogConfig, metrics: &MetricsConfig) -> TelemetryResult<()> {
    init_logging(logging)?;
    init_metrics(metrics)
}
