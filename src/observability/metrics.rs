//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): exchanges by route, status
//! - `gateway_request_duration_seconds` (histogram): end-to-end latency
//! - `gateway_errors_total` (counter): engine errors by kind
//! - `gateway_breaker_calls_total` (counter): breaker outcomes by name, outcome
//! - `gateway_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - The Prometheus exporter is optional and serves its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::BreakerState;

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
/// Must be called from inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one finished exchange. `route` is "none" when nothing matched.
pub fn record_request(route: &str, status: u16, start: Instant) {
    let route = route.to_string();
    ::metrics::counter!(
        "gateway_requests_total",
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("gateway_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_error(kind: &'static str) {
    ::metrics::counter!("gateway_errors_total", "kind" => kind).increment(1);
}

pub fn record_breaker_call(name: &str, outcome: &'static str) {
    ::metrics::counter!(
        "gateway_breaker_calls_total",
        "breaker" => name.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_breaker_state(name: &str, state: BreakerState) {
    ::metrics::gauge!("gateway_breaker_state", "breaker" => name.to_string()).set(state.as_gauge());
}
