//! Admin JSON surface.
//!
//! Served on its own listener so it stays reachable when the front door is
//! saturated.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::balancer::Balancer;
use crate::config::AdminConfig;
use crate::lifecycle::ShutdownSignal;

#[derive(Clone)]
pub struct AdminState {
    pub balancer: Arc<Balancer>,
    pub api_key: Option<Arc<str>>,
}

pub fn setup_admin_router(balancer: Arc<Balancer>, config: &AdminConfig) -> Router {
    let state = AdminState {
        balancer,
        api_key: auth::api_key(config.api_key.as_deref()),
    };

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/stats", get(get_stats))
        .route("/admin/stats/reset", post(reset_stats))
        .route("/admin/backends", get(get_backends))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin router until shutdown.
pub async fn run(
    router: Router,
    listener: TcpListener,
    mut shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.recv().await })
        .await?;

    tracing::info!("Admin server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::{BackendConfig, BalancerConfig};
    use crate::transport::SimulatedTransport;

    fn balancer() -> Arc<Balancer> {
        let config = BalancerConfig {
            backends: vec![
                BackendConfig::new("http://a:1", 1),
                BackendConfig::new("http://b:1", 2),
            ],
            ..Default::default()
        };
        Arc::new(Balancer::from_config(&config, Arc::new(SimulatedTransport::default())).unwrap())
    }

    async fn json(router: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_stats_and_backends() {
        let router = setup_admin_router(balancer(), &AdminConfig::default());

        let (status, stats) = json(
            router.clone(),
            Request::get("/admin/stats").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(stats["algorithm"], "round_robin");
        assert_eq!(stats["global"]["total_requests"], 0);
        assert_eq!(stats["backends"].as_array().unwrap().len(), 2);

        let (_, backends) = json(
            router.clone(),
            Request::get("/admin/backends").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(backends[1]["endpoint"], "http://b:1");
        assert_eq!(backends[1]["weight"], 2);
        assert_eq!(backends[1]["circuit_state"], "closed");

        let (_, summary) = json(
            router,
            Request::get("/admin/status").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(summary["status"], "operational");
        assert_eq!(summary["eligible_backends"], 2);
    }

    #[tokio::test]
    async fn test_reset_requires_post() {
        let router = setup_admin_router(balancer(), &AdminConfig::default());
        let (status, _) = json(
            router.clone(),
            Request::get("/admin/stats/reset").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

        let (status, global) = json(
            router,
            Request::post("/admin/stats/reset").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(global["successful_requests"], 0);
    }

    #[tokio::test]
    async fn test_api_key_enforced() {
        let config = AdminConfig {
            api_key: Some("secret".into()),
            ..Default::default()
        };
        let router = setup_admin_router(balancer(), &config);

        let (status, _) = json(
            router.clone(),
            Request::get("/admin/status").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = json(
            router,
            Request::get("/admin/status")
                .header(header::AUTHORIZATION, "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
}
