//! Server registry.
//!
//! # Responsibilities
//! - Own every backend record for the process lifetime
//! - Decide eligibility (healthy AND circuit admits traffic)
//! - Apply live and probe outcomes, reporting every transition
//!
//! The backend list is fixed at construction; records are never added or
//! removed afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::BackendConfig;
use crate::load_balancer::backend::Backend;
use crate::observability::{metrics, BalancerEvent, EventBus};
use crate::resilience::{BreakerPolicy, CircuitState, Transition};

/// Authoritative store of backend state.
#[derive(Debug)]
pub struct ServerRegistry {
    backends: Vec<Arc<Backend>>,
    index: HashMap<String, usize>,
    policy: BreakerPolicy,
    events: EventBus,
}

impl ServerRegistry {
    /// Build the registry. Configs are expected to be validated already;
    /// a repeated endpoint keeps its first entry.
    pub fn new(configs: &[BackendConfig], policy: BreakerPolicy, events: EventBus) -> Self {
        let mut backends = Vec::with_capacity(configs.len());
        let mut index = HashMap::with_capacity(configs.len());

        for config in configs {
            let endpoint = config.endpoint.trim().to_string();
            if index.contains_key(&endpoint) {
                tracing::warn!(endpoint = %endpoint, "Duplicate backend ignored");
                continue;
            }
            index.insert(endpoint.clone(), backends.len());
            backends.push(Arc::new(Backend::new(endpoint, config.weight)));
        }

        tracing::info!(backends = backends.len(), "Server registry initialized");

        Self {
            backends,
            index,
            policy,
            events,
        }
    }

    /// All backends in configuration order.
    pub fn all(&self) -> &[Arc<Backend>] {
        &self.backends
    }

    pub fn get(&self, endpoint: &str) -> Option<Arc<Backend>> {
        self.index.get(endpoint).map(|&i| Arc::clone(&self.backends[i]))
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn policy(&self) -> &BreakerPolicy {
        &self.policy
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Move every open circuit whose reset timeout has elapsed to half-open.
    pub fn refresh_circuits(&self) {
        let now = Instant::now();
        for backend in &self.backends {
            if let Some(transition) = backend.poll_circuit(&self.policy, now) {
                self.report_transition(backend, transition, backend.consecutive_failures());
            }
        }
    }

    pub fn is_eligible(&self, backend: &Backend) -> bool {
        backend.is_eligible(&self.policy)
    }

    /// Eligible backends in configuration order.
    pub fn eligible(&self) -> Vec<Arc<Backend>> {
        self.backends
            .iter()
            .filter(|b| b.is_eligible(&self.policy))
            .cloned()
            .collect()
    }

    pub fn record_success(&self, backend: &Backend, latency: Duration) {
        metrics::record_attempt(backend.endpoint(), true);
        if let Some(transition) = backend.record_success(latency, Instant::now()) {
            self.report_transition(backend, transition, 0);
        }
    }

    pub fn record_failure(&self, backend: &Backend) {
        metrics::record_attempt(backend.endpoint(), false);
        let outcome = backend.record_failure(&self.policy, Instant::now());
        tracing::debug!(
            endpoint = %backend.endpoint(),
            consecutive_failures = outcome.consecutive_failures,
            "Attempt failed"
        );
        if let Some(transition) = outcome.transition {
            self.report_transition(backend, transition, outcome.consecutive_failures);
        }
    }

    pub fn record_probe(&self, backend: &Backend, healthy: bool, latency: Duration) {
        let outcome = backend.record_probe(healthy, &self.policy, Instant::now());
        let endpoint = backend.endpoint().to_string();

        self.events.emit(BalancerEvent::HealthCheckCompleted {
            endpoint: endpoint.clone(),
            healthy,
            latency_ms: latency.as_millis() as u64,
        });
        metrics::record_backend_health(&endpoint, healthy);

        match outcome.health_changed {
            Some(true) => {
                tracing::info!(endpoint = %endpoint, "Backend became healthy");
                self.events.emit(BalancerEvent::ServerBecameHealthy { endpoint: endpoint.clone() });
            }
            Some(false) => {
                tracing::warn!(
                    endpoint = %endpoint,
                    consecutive_failures = outcome.consecutive_failures,
                    "Backend became unhealthy"
                );
                self.events.emit(BalancerEvent::ServerBecameUnhealthy {
                    endpoint: endpoint.clone(),
                    consecutive_failures: outcome.consecutive_failures,
                });
            }
            None => {}
        }

        if let Some(transition) = outcome.transition {
            self.report_transition(backend, transition, outcome.consecutive_failures);
        }
    }

    fn report_transition(&self, backend: &Backend, transition: Transition, consecutive_failures: u32) {
        let endpoint = backend.endpoint().to_string();
        metrics::record_circuit_state(&endpoint, transition.to);

        let event = match transition.to {
            CircuitState::Open => {
                tracing::warn!(
                    endpoint = %endpoint,
                    from = %transition.from,
                    consecutive_failures,
                    "Circuit opened"
                );
                BalancerEvent::CircuitOpened { endpoint, consecutive_failures }
            }
            CircuitState::HalfOpen => {
                tracing::info!(endpoint = %endpoint, "Circuit half-open");
                BalancerEvent::CircuitHalfOpened { endpoint }
            }
            CircuitState::Closed => {
                tracing::info!(endpoint = %endpoint, "Circuit closed");
                BalancerEvent::CircuitClosed { endpoint }
            }
        };
        self.events.emit(event);
    }
}
