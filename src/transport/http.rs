//! HTTP transport backed by the hyper-util client.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, Request, Uri};
use futures_util::future::{BoxFuture, FutureExt};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;

use crate::transport::{strip_hop_by_hop, ProxyRequest, ProxyResponse, Transport, TransportError};

const USER_AGENT: &str = concat!("upstream-balancer/", env!("CARGO_PKG_VERSION"));

/// Forwards requests over plain HTTP/1.1 with a pooled client.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
    max_body_bytes: usize,
}

impl HttpTransport {
    pub fn new(max_body_bytes: usize) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_nodelay(true);
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            max_body_bytes,
        }
    }

    async fn round_trip(
        &self,
        endpoint: &str,
        request: ProxyRequest,
    ) -> Result<ProxyResponse, TransportError> {
        let uri = backend_uri(endpoint, &request.path)?;

        let mut builder = Request::builder().method(request.method).uri(uri);
        if let Some(headers) = builder.headers_mut() {
            let mut forwarded = request.headers;
            strip_hop_by_hop(&mut forwarded);
            headers.extend(forwarded);
            headers
                .entry(header::USER_AGENT)
                .or_insert(HeaderValue::from_static(USER_AGENT));
        }
        let req = builder
            .body(Body::from(request.body))
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let response: hyper::Response<Incoming> = self
            .client
            .request(req)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let (parts, body) = response.into_parts();
        let body = axum::body::to_bytes(Body::new(body), self.max_body_bytes)
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);

        Ok(ProxyResponse {
            status: parts.status,
            headers,
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        request: ProxyRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<ProxyResponse, TransportError>> {
        async move {
            match time::timeout(timeout, self.round_trip(endpoint, request)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(timeout)),
            }
        }
        .boxed()
    }
}

/// Join a backend base URL and a request path.
fn backend_uri(endpoint: &str, path: &str) -> Result<Uri, TransportError> {
    let base = endpoint.trim_end_matches('/');
    let path = if path.starts_with('/') { path.to_string() } else { format!("/{}", path) };
    format!("{}{}", base, path)
        .parse::<Uri>()
        .map_err(|e| TransportError::InvalidRequest(format!("{}: {}", endpoint, e)))
}
