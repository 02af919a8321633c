//! The owning balancer handle.
//!
//! # Data Flow
//! ```text
//! forward(request, ctx)
//!     → select: refresh circuits → sticky session? → algorithm
//!     → dispatch: connection guard → Transport::send under deadline
//!     → registry outcome (may trip the breaker)
//!     → failure: linear backoff, re-select, retry
//!     → success: stats, optional session binding
//! ```
//!
//! # Design Decisions
//! - One `Balancer` owns the registry, sessions and stats; callers share it
//!   through `Arc<Balancer>`
//! - The transport is injected, so the same core runs over HTTP or the
//!   simulated transport

pub mod error;
pub mod forwarder;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{validate_config, Algorithm, BalancerConfig, ConfigError, HealthCheckConfig};
use crate::health::HealthMonitor;
use crate::lifecycle::Shutdown;
use crate::load_balancer::{self, Backend, LoadBalancer, SelectionContext, ServerRegistry};
use crate::observability::{BalancerEvent, EventBus, StatsAggregator, StatsSnapshot};
use crate::resilience::{BreakerPolicy, RetryPolicy};
use crate::session::SessionAffinity;
use crate::transport::Transport;

pub use self::error::BalancerError;
pub use self::forwarder::Forwarded;

/// Per-request routing inputs.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Client identifier for hash routing, usually the client IP.
    pub client_id: Option<String>,
    /// Session token presented by the client, if any.
    pub session_token: Option<String>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

pub struct Balancer {
    registry: Arc<ServerRegistry>,
    algorithm: Algorithm,
    selector: Box<dyn LoadBalancer>,
    sessions: Arc<SessionAffinity>,
    stats: StatsAggregator,
    events: EventBus,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
    request_timeout: Duration,
    health: HealthCheckConfig,
}

impl Balancer {
    /// Build a balancer from validated configuration.
    pub fn from_config(
        config: &BalancerConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        validate_config(config).map_err(ConfigError::Validation)?;

        let events = EventBus::default();
        let registry = Arc::new(ServerRegistry::new(
            &config.backends,
            BreakerPolicy::from(&config.circuit_breaker),
            events.clone(),
        ));
        let selector = load_balancer::build(config.algorithm);

        tracing::info!(
            algorithm = selector.name(),
            backends = registry.len(),
            retries = config.retry.enabled,
            session_affinity = config.session_affinity.enabled,
            "Balancer initialized"
        );

        Ok(Self {
            registry,
            algorithm: config.algorithm,
            selector,
            sessions: Arc::new(SessionAffinity::new(&config.session_affinity)),
            stats: StatsAggregator::new(),
            events,
            transport,
            retry: RetryPolicy::new(&config.retry),
            request_timeout: config.timeouts.request(),
            health: config.health_check.clone(),
        })
    }

    pub fn registry(&self) -> &Arc<ServerRegistry> {
        &self.registry
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn sessions(&self) -> &Arc<SessionAffinity> {
        &self.sessions
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BalancerEvent> {
        self.events.subscribe()
    }

    /// A health monitor probing this balancer's backends.
    pub fn health_monitor(&self) -> HealthMonitor {
        HealthMonitor::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.transport),
            self.health.clone(),
        )
    }

    /// Spawn the health monitor and, if affinity is on, the session sweeper.
    pub fn spawn_background(&self, shutdown: &Shutdown) -> Vec<JoinHandle<()>> {
        let mut tasks = vec![tokio::spawn(self.health_monitor().run(shutdown.subscribe()))];
        if self.sessions.is_enabled() {
            tasks.push(tokio::spawn(
                Arc::clone(&self.sessions).run_sweeper(shutdown.subscribe()),
            ));
        }
        tasks
    }

    /// Choose the backend for one attempt.
    ///
    /// A valid session token wins while its backend stays eligible;
    /// otherwise the configured algorithm decides.
    pub fn select(&self, ctx: &RequestContext) -> Result<Arc<Backend>, BalancerError> {
        self.registry.refresh_circuits();

        if let Some(backend) = self.pinned_backend(ctx) {
            return Ok(backend);
        }

        let selection = SelectionContext {
            client_id: ctx.client_id.as_deref(),
        };
        self.selector
            .next_server(&self.registry, &selection)
            .ok_or(BalancerError::NoHealthyBackend)
    }

    fn pinned_backend(&self, ctx: &RequestContext) -> Option<Arc<Backend>> {
        if !self.sessions.is_enabled() {
            return None;
        }
        let endpoint = self.sessions.lookup(ctx.session_token.as_deref()?)?;
        let backend = self.registry.get(&endpoint)?;
        if self.registry.is_eligible(&backend) {
            Some(backend)
        } else {
            tracing::debug!(endpoint = %endpoint, "Pinned backend ineligible, falling back");
            None
        }
    }

    /// Point-in-time statistics.
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            global: self.stats.snapshot(),
            algorithm: self.selector.name(),
            active_sessions: self.sessions.active_count(),
            backends: self.registry.all().iter().map(|b| b.snapshot()).collect(),
        }
    }

    /// Zero the global counters.
    pub fn reset_stats(&self) {
        self.stats.reset();
        tracing::info!("Global stats reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendConfig, SessionAffinityConfig};
    use crate::transport::SimulatedTransport;

    fn config(algorithm: Algorithm) -> BalancerConfig {
        BalancerConfig {
            algorithm,
            backends: vec![
                BackendConfig::new("http://a:1", 1),
                BackendConfig::new("http://b:1", 1),
            ],
            session_affinity: SessionAffinityConfig {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn balancer(algorithm: Algorithm) -> Balancer {
        Balancer::from_config(&config(algorithm), Arc::new(SimulatedTransport::default())).unwrap()
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Balancer::from_config(
            &BalancerConfig::default(),
            Arc::new(SimulatedTransport::default()),
        )
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[tokio::test]
    async fn test_session_token_pins_selection() {
        let lb = balancer(Algorithm::RoundRobin);
        let token = lb.sessions().bind("http://b:1");
        let ctx = RequestContext::new().with_session_token(token);

        for _ in 0..5 {
            assert_eq!(lb.select(&ctx).unwrap().endpoint(), "http://b:1");
        }
    }

    #[tokio::test]
    async fn test_unknown_token_falls_through() {
        let lb = balancer(Algorithm::RoundRobin);
        let ctx = RequestContext::new().with_session_token("nope");
        let first = lb.select(&ctx).unwrap();
        let second = lb.select(&ctx).unwrap();
        assert_ne!(first.endpoint(), second.endpoint());
    }

    #[tokio::test]
    async fn test_empty_eligible_set() {
        let lb = balancer(Algorithm::LeastConnections);
        for backend in lb.registry().all() {
            lb.registry().record_probe(backend, false, Duration::ZERO);
        }
        assert!(matches!(
            lb.select(&RequestContext::new()),
            Err(BalancerError::NoHealthyBackend)
        ));
    }

    #[tokio::test]
    async fn test_stats_snapshot_shape() {
        let lb = balancer(Algorithm::IpHash);
        lb.sessions().bind("http://a:1");
        let stats = lb.stats();
        assert_eq!(stats.algorithm, "ip_hash");
        assert_eq!(stats.active_sessions, 1);
        assert_eq!(stats.backends.len(), 2);
        assert_eq!(stats.global.total_requests, 0);
    }
}
