//! HTTP front door.
//!
//! # Responsibilities
//! - Create the Axum router with the catch-all proxy handler
//! - Wire up middleware (tracing, request ID)
//! - Translate between HTTP and the balancer's buffered request/response
//! - Carry the sticky session cookie
//! - Map forwarding failures onto 502/503/504

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::balancer::{Balancer, BalancerError, RequestContext};
use crate::config::BalancerConfig;
use crate::lifecycle::ShutdownSignal;
use crate::transport::{strip_hop_by_hop, ProxyRequest};

pub const X_REQUEST_ID: &str = "x-request-id";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub balancer: Arc<Balancer>,
    pub max_body_bytes: usize,
}

/// HTTP server forwarding every request through the balancer.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(balancer: Arc<Balancer>, config: &BalancerConfig) -> Self {
        let state = AppState {
            balancer,
            max_body_bytes: config.listener.max_body_bytes,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::x_request_id()),
            )
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    let request_id = parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to buffer request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let balancer = &state.balancer;
    let mut ctx = RequestContext::new().with_client_id(client_id(&parts.headers, peer));
    if balancer.sessions().is_enabled() {
        ctx.session_token = session_cookie(&parts.headers, balancer.sessions().cookie_name());
    }

    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        path = %path,
        "Proxying request"
    );

    let request = ProxyRequest {
        method: parts.method,
        path,
        headers: parts.headers,
        body,
    };

    match balancer.forward(request, &ctx).await {
        Ok(forwarded) => {
            let mut headers = forwarded.response.headers;
            strip_hop_by_hop(&mut headers);

            if let Some(token) = forwarded.session_token {
                let sessions = balancer.sessions();
                let cookie = format!(
                    "{}={}; Max-Age={}; Path=/; HttpOnly",
                    sessions.cookie_name(),
                    token,
                    sessions.ttl().as_secs()
                );
                match HeaderValue::from_str(&cookie) {
                    Ok(value) => {
                        headers.append(header::SET_COOKIE, value);
                    }
                    Err(e) => {
                        tracing::error!(request_id = %request_id, error = %e, "Invalid session cookie");
                    }
                }
            }

            let mut response = Response::new(Body::from(forwarded.response.body));
            *response.status_mut() = forwarded.response.status;
            *response.headers_mut() = headers;
            response
        }
        Err(e) => {
            let status = error_status(&e);
            tracing::warn!(
                request_id = %request_id,
                status = %status,
                attempts = e.attempts(),
                error = %e,
                "Forwarding failed"
            );
            (status, e.to_string()).into_response()
        }
    }
}

/// Status returned to the client for a forwarding failure.
pub fn error_status(err: &BalancerError) -> StatusCode {
    if err.is_no_healthy_backend() {
        StatusCode::SERVICE_UNAVAILABLE
    } else if err.is_timeout() {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    }
}

/// First `X-Forwarded-For` hop, else the peer IP.
fn client_id(headers: &HeaderMap, peer: SocketAddr) -> String {
    headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| peer.ip().to_string())
}

/// Value of the named cookie across all `Cookie` headers.
fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}
