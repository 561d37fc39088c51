//! Prometheus metrics.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `portico_requests_total` | Counter | `route`, `code` | Calls that left the chain |
//! | `portico_request_duration_seconds` | Histogram | `route` | Time spent inside the chain |
//! | `portico_rate_limited_total` | Counter | `route` | Calls rejected by admission control |
//! | `portico_panics_total` | Counter | `route` | Handler panics recovered |
//! | `portico_authz_denied_total` | Counter | `route`, `reason` | Authorization denials |
//!
//! The recording functions are safe to call before [`init_metrics`]; the
//! `metrics` facade discards samples when no recorder is installed.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Metric names.
pub mod names {
    /// Calls that left the chain.
    pub const REQUESTS_TOTAL: &str = "portico_requests_total";
    /// Time spent inside the chain.
    pub const REQUEST_DURATION_SECONDS: &str = "portico_request_duration_seconds";
    /// Calls rejected by admission control.
    pub const RATE_LIMITED_TOTAL: &str = "portico_rate_limited_total";
    /// Handler panics recovered.
    pub const PANICS_TOTAL: &str = "portico_panics_total";
    /// Authorization denials.
    pub const AUTHZ_DENIED_TOTAL: &str = "portico_authz_denied_total";
}

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether the Prometheus listener is installed.
    pub enabled: bool,

    /// Address the Prometheus scrape endpoint binds to.
    pub addr: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Installs the Prometheus recorder and its HTTP scrape listener.
///
/// The listener runs on the ambient tokio runtime when there is one.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidAddress`] for an unparsable address and
/// [`TelemetryError::MetricsInit`] if a recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let addr: SocketAddr = config
        .addr
        .parse()
        .map_err(|e| TelemetryError::InvalidAddress(format!("{}: {e}", config.addr)))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    describe_metrics();

    tracing::info!(%addr, "prometheus exporter listening");
    Ok(())
}

fn describe_metrics() {
    describe_counter!(names::REQUESTS_TOTAL, "Calls that left the interceptor chain");
    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        "Time spent inside the interceptor chain in seconds"
    );
    describe_counter!(
        names::RATE_LIMITED_TOTAL,
        "Calls rejected by the token bucket"
    );
    describe_counter!(names::PANICS_TOTAL, "Handler panics recovered");
    describe_counter!(names::AUTHZ_DENIED_TOTAL, "Authorization denials by reason");
}

/// Records a call that left the chain with the given RPC code name.
pub fn record_request(route: &str, code: &str, duration: Duration) {
    counter!(
        names::REQUESTS_TOTAL,
        "route" => route.to_string(),
        "code" => code.to_string()
    )
    .increment(1);

    histogram!(names::REQUEST_DURATION_SECONDS, "route" => route.to_string())
        .record(duration.as_secs_f64());
}

/// Records a call rejected by admission control.
pub fn record_rate_limited(route: &str) {
    counter!(names::RATE_LIMITED_TOTAL, "route" => route.to_string()).increment(1);
}

/// Records a recovered handler panic.
pub fn record_panic(route: &str) {
    counter!(names::PANICS_TOTAL, "route" => route.to_string()).increment(1);
}

/// Records an authorization denial.
pub fn record_authz_denied(route: &str, reason: &str) {
    counter!(
        names::AUTHZ_DENIED_TOTAL,
        "route" => route.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}
