//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guard_requests_total` (counter): requests by endpoint and outcome
//! - `guard_request_duration_seconds` (histogram): validation + handler latency
//! - `guard_rate_limited_total` (counter): rate-limit rejections by endpoint
//! - `guard_security_events_total` (counter): logged security events by severity
//! - `guard_rate_limit_keys` (gauge): tracked (route, client) keys
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op, so library code and tests need no setup
//! - Labels are bounded: endpoint names come from config, never from paths

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::security::events::Severity;

/// Start the Prometheus scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Count one request and its latency.
pub fn record_request(endpoint: &str, outcome: &'static str, start: Instant) {
    metrics::counter!("guard_requests_total", "endpoint" => endpoint.to_string(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!("guard_request_duration_seconds", "endpoint" => endpoint.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(endpoint: &str) {
    metrics::counter!("guard_rate_limited_total", "endpoint" => endpoint.to_string()).increment(1);
}

pub fn record_security_event(severity: Severity) {
    metrics::counter!("guard_security_events_total", "severity" => severity.as_str()).increment(1);
}

pub fn set_rate_limit_keys(count: usize) {
    metrics::gauge!("guard_rate_limit_keys").set(count as f64);
}
