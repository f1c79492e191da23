//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define runtime metrics (requests, latency, component creations, startup)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `procyon_requests_total` (counter): requests by method, status, route
//! - `procyon_request_duration_seconds` (histogram): latency by method, route
//! - `procyon_component_creations_total` (counter): instances built, by scope
//! - `procyon_startup_seconds` (gauge): time from Starting to Ready
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - The route label is the matched pattern, never the raw path, to keep
//!   cardinality bounded

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics_exporter_prometheus::PrometheusBuilder;

pub const REQUESTS_TOTAL: &str = "procyon_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "procyon_request_duration_seconds";
pub const COMPONENT_CREATIONS_TOTAL: &str = "procyon_component_creations_total";
pub const STARTUP_SECONDS: &str = "procyon_startup_seconds";

/// Install the Prometheus recorder and its HTTP listener on `addr`.
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one dispatched request.
pub fn record_request(method: &str, status: u16, route: &str, started: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string()
    )
    .increment(1);
    metrics::histogram!(
        REQUEST_DURATION_SECONDS,
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(started.elapsed().as_secs_f64());
}

pub fn record_component_creation(scope: &str) {
    metrics::counter!(COMPONENT_CREATIONS_TOTAL, "scope" => scope.to_string()).increment(1);
}

pub fn record_startup(elapsed: Duration) {
    metrics::gauge!(STARTUP_SECONDS).set(elapsed.as_secs_f64());
}
