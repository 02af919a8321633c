//! Simulated transport for demos and local experiments.
//!
//! Each call sleeps for a random latency and fails with a configured
//! probability. No network traffic is generated.

use std::ops::RangeInclusive;
use std::time::Duration;

use axum::http::StatusCode;
use futures_util::future::{BoxFuture, FutureExt};
use tokio::time;

use crate::transport::{ProxyRequest, ProxyResponse, Transport, TransportError};

/// Randomized stand-in for a real network client.
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    failure_rate: f64,
    latency_ms: RangeInclusive<u64>,
}

impl SimulatedTransport {
    pub fn new(failure_rate: f64, latency_ms: RangeInclusive<u64>) -> Self {
        Self {
            failure_rate: failure_rate.clamp(0.0, 1.0),
            latency_ms,
        }
    }
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(0.1, 50..=500)
    }
}

impl Transport for SimulatedTransport {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        request: ProxyRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<ProxyResponse, TransportError>> {
        async move {
            let latency = Duration::from_millis(fastrand::u64(self.latency_ms.clone()));
            if latency > timeout {
                time::sleep(timeout).await;
                return Err(TransportError::Timeout(timeout));
            }
            time::sleep(latency).await;

            if fastrand::f64() < self.failure_rate {
                return Err(TransportError::Connect(format!("simulated failure at {}", endpoint)));
            }

            let body = serde_json::json!({
                "backend": endpoint,
                "method": request.method.as_str(),
                "path": request.path,
                "latency_ms": latency.as_millis() as u64,
            });
            Ok(ProxyResponse::new(StatusCode::OK, body.to_string()))
        }
        .boxed()
    }
}
