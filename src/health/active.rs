//! Active health checking.
//!
//! # Responsibilities
//! - Periodically probe every backend, concurrently
//! - Feed each probe outcome into the registry

use std::sync::Arc;

use futures_util::future::join_all;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::HealthCheckConfig;
use crate::lifecycle::ShutdownSignal;
use crate::load_balancer::{Backend, ServerRegistry};
use crate::resilience::timeouts::with_deadline;
use crate::transport::{ProxyRequest, Transport, TransportError};

pub struct HealthMonitor {
    registry: Arc<ServerRegistry>,
    transport: Arc<dyn Transport>,
    config: HealthCheckConfig,
}

impl HealthMonitor {
    pub fn new(
        registry: Arc<ServerRegistry>,
        transport: Arc<dyn Transport>,
        config: HealthCheckConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            config,
        }
    }

    pub async fn run(self, mut shutdown: ShutdownSignal) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Health monitor starting"
        );

        let mut ticker = time::interval(self.config.interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_all().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Probe every backend once, concurrently.
    pub async fn check_all(&self) {
        let checks = self
            .registry
            .all()
            .iter()
            .map(|backend| self.check_backend(backend));
        join_all(checks).await;
    }

    async fn check_backend(&self, backend: &Backend) {
        let started = Instant::now();
        let attempts = self.config.retries.saturating_add(1);
        let mut healthy = false;

        for attempt in 1..=attempts {
            match self.probe(backend.endpoint()).await {
                Ok(()) => {
                    healthy = true;
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        endpoint = %backend.endpoint(),
                        attempt,
                        error = %e,
                        "Health check failed"
                    );
                }
            }
        }

        self.registry.record_probe(backend, healthy, started.elapsed());
    }

    async fn probe(&self, endpoint: &str) -> Result<(), TransportError> {
        let timeout = self.config.timeout();
        let request = ProxyRequest::get(self.config.path.clone());
        let response =
            with_deadline(timeout, self.transport.send(endpoint, request, timeout)).await?;

        if response.status.as_u16() == self.config.expected_status {
            Ok(())
        } else {
            Err(TransportError::UpstreamStatus(response.status))
        }
    }
}
