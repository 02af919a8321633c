//! Bearer-token guard for admin routes.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::admin::AdminState;

/// Reject admin requests without the configured bearer token.
///
/// With no token configured every request passes.
pub async fn admin_auth_middleware(
    State(state): State<AdminState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = state.api_key.as_deref() else {
        return Ok(next.run(request).await);
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    if presented == Some(expected) {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(path = %request.uri().path(), "Admin request rejected");
        Err(StatusCode::UNAUTHORIZED)
    }
}

pub(crate) fn api_key(raw: Option<&str>) -> Option<Arc<str>> {
    raw.map(str::trim).filter(|k| !k.is_empty()).map(Arc::from)
}
