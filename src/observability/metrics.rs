//! Metrics collection and exposition.
//!
//! # Metrics
//! - `balancer_requests_total` (counter): client requests by outcome
//! - `balancer_request_duration_seconds` (histogram): end-to-end latency
//! - `balancer_request_attempts` (histogram): attempts per client request
//! - `balancer_attempts_total` (counter): forwarding attempts by backend, outcome
//! - `balancer_retries_total` (counter): retried attempts
//! - `balancer_active_connections` (gauge): in-flight requests per backend
//! - `balancer_backend_health` (gauge): 1=healthy, 0=unhealthy
//! - `balancer_circuit_state` (gauge): 0=closed, 1=half_open, 2=open
//! - `balancer_sessions_active` (gauge): live sticky sessions
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Prometheus exporter listening");
    Ok(())
}

/// Record a finished client request.
pub fn record_request(outcome: &'static str, attempts: u32, elapsed: Duration) {
    counter!("balancer_requests_total", "outcome" => outcome).increment(1);
    histogram!("balancer_request_duration_seconds", "outcome" => outcome)
        .record(elapsed.as_secs_f64());
    histogram!("balancer_request_attempts").record(f64::from(attempts));
}

pub fn record_attempt(endpoint: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    counter!(
        "balancer_attempts_total",
        "backend" => endpoint.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_retry() {
    counter!("balancer_retries_total").increment(1);
}

pub fn record_active_connections(endpoint: &str, active: usize) {
    gauge!("balancer_active_connections", "backend" => endpoint.to_string()).set(active as f64);
}

pub fn record_backend_health(endpoint: &str, healthy: bool) {
    gauge!("balancer_backend_health", "backend" => endpoint.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_circuit_state(endpoint: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("balancer_circuit_state", "backend" => endpoint.to_string()).set(value);
}

pub fn record_sessions(active: usize) {
    gauge!("balancer_sessions_active").set(active as f64);
}
