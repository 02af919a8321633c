//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order
//! - Start background tasks (health checks, session sweeps)
//! - Bind listeners and begin accepting traffic
//! - Wait for every task to drain after shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin;
use crate::balancer::Balancer;
use crate::config::{BalancerConfig, ConfigError};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::transport::Transport;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("invalid metrics address {0}")]
    MetricsAddress(String),

    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
}

/// Run the balancer until `shutdown` fires.
pub async fn serve(
    config: BalancerConfig,
    transport: Arc<dyn Transport>,
    shutdown: Shutdown,
) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let balancer = Arc::new(Balancer::from_config(&config, transport)?);
    let mut tasks = balancer.spawn_background(&shutdown);

    if config.admin.enabled {
        let listener = bind(&config.admin.bind_address).await?;
        let router = admin::setup_admin_router(Arc::clone(&balancer), &config.admin);
        let signal = shutdown.subscribe();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = admin::run(router, listener, signal).await {
                tracing::error!(error = %e, "Admin server failed");
            }
        }));
    }

    let listener = bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(Arc::clone(&balancer), &config);
    let result = server.run(listener, shutdown.subscribe()).await;

    // The front door may also exit on its own error; stop everything else.
    shutdown.trigger();
    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Background task panicked");
        }
    }

    result?;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}
