//! Transport abstraction.
//!
//! # Data Flow
//! ```text
//! Balancer (live traffic) ─┐
//!                          ├─▶ Transport::send(endpoint, request, timeout)
//! HealthMonitor (probes) ──┘        │
//!                                   ├─ http.rs      (hyper-util client)
//!                                   └─ simulated.rs (random outcome + latency)
//! ```
//!
//! # Design Decisions
//! - Object safe (`Arc<dyn Transport>`) so implementations swap without
//!   touching balancer logic
//! - Requests and responses are fully buffered; retries replay the same bytes
//! - A transport reports every single-attempt failure as `TransportError`

pub mod http;
pub mod simulated;

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method, StatusCode};
use futures_util::future::BoxFuture;
use thiserror::Error;

pub use self::http::HttpTransport;
pub use self::simulated::SimulatedTransport;

/// A buffered request to forward to one backend.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path and query, always starting with `/`.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// A body-less GET, as used by health probes.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }
}

/// A buffered response from a backend.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ProxyResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// Failure of a single attempt against a single backend.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("upstream answered {0}")]
    UpstreamStatus(StatusCode),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to read body: {0}")]
    Body(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

/// Sends one request to one backend and returns its response or a failure
/// within `timeout`.
pub trait Transport: Send + Sync + 'static {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        request: ProxyRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<ProxyResponse, TransportError>>;
}

/// Remove headers that apply to a single connection hop.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in [
        header::CONNECTION,
        header::HOST,
        header::TRANSFER_ENCODING,
        header::TE,
        header::TRAILER,
        header::UPGRADE,
        header::PROXY_AUTHORIZATION,
        header::CONTENT_LENGTH,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }
}
