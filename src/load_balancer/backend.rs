//! Backend record.
//!
//! # Responsibilities
//! - Represent a single backend server and its mutable state
//! - Track active connections (for Least Connections LB)
//! - Track health, consecutive failures and the embedded circuit breaker
//! - Count attempts, successes and failures
//!
//! All non-atomic state sits behind one mutex per record, so a health probe
//! and a live request never interleave inside a transition.

use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tokio::time::Instant;

use crate::observability::stats::unix_millis;
use crate::resilience::{BreakerPolicy, CircuitBreaker, CircuitState, Transition};

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    endpoint: String,
    weight: u32,
    active_connections: AtomicUsize,
    state: Mutex<BackendState>,
}

#[derive(Debug)]
struct BackendState {
    healthy: bool,
    consecutive_failures: u32,
    breaker: CircuitBreaker,
    last_health_check: Option<SystemTime>,
    response_time_ms: u64,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
}

/// Result of recording a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub consecutive_failures: u32,
    pub transition: Option<Transition>,
}

/// Result of recording a health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// `Some(new_value)` when the healthy flag flipped.
    pub health_changed: Option<bool>,
    pub consecutive_failures: u32,
    pub transition: Option<Transition>,
}

/// Serializable point-in-time view of a backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackendSnapshot {
    pub endpoint: String,
    pub weight: u32,
    pub healthy: bool,
    pub circuit_state: CircuitState,
    pub consecutive_failures: u32,
    pub active_connections: usize,
    pub response_time_ms: u64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Milliseconds since the Unix epoch.
    pub last_health_check: Option<u64>,
    /// Milliseconds since the last circuit transition.
    pub ms_since_circuit_transition: u64,
}

impl Backend {
    /// Create a new backend. It starts healthy with a closed circuit.
    pub fn new(endpoint: impl Into<String>, weight: u32) -> Self {
        Self {
            endpoint: endpoint.into(),
            weight,
            active_connections: AtomicUsize::new(0),
            state: Mutex::new(BackendState {
                healthy: true,
                consecutive_failures: 0,
                breaker: CircuitBreaker::new(Instant::now()),
                last_health_check: None,
                response_time_ms: 0,
                total_requests: 0,
                successful_requests: 0,
                failed_requests: 0,
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Get the current number of active connections.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    pub fn is_healthy(&self) -> bool {
        self.lock().healthy
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.lock().breaker.state()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Healthy and admitted by the circuit breaker.
    pub fn is_eligible(&self, policy: &BreakerPolicy) -> bool {
        let state = self.lock();
        state.healthy && state.breaker.admits(policy)
    }

    /// Lazy Open → Half-Open evaluation.
    pub fn poll_circuit(&self, policy: &BreakerPolicy, now: Instant) -> Option<Transition> {
        self.lock().breaker.poll(policy, now)
    }

    /// Start an attempt: counts it and returns a guard holding one connection.
    pub fn acquire(self: &Arc<Self>) -> ConnectionGuard {
        let trial = {
            let mut state = self.lock();
            state.total_requests += 1;
            state.breaker.on_dispatch()
        };
        self.active_connections.fetch_add(1, Ordering::AcqRel);
        ConnectionGuard {
            backend: Arc::clone(self),
            trial,
            settled: false,
        }
    }

    fn release(&self) {
        // Saturate at zero rather than wrap.
        let _ = self
            .active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    fn return_trial(&self, window: Instant) {
        self.lock().breaker.on_trial_abandoned(window);
    }

    /// A live request succeeded.
    pub fn record_success(&self, latency: Duration, now: Instant) -> Option<Transition> {
        let mut state = self.lock();
        state.successful_requests += 1;
        state.consecutive_failures = 0;
        state.response_time_ms = latency.as_millis() as u64;
        state.breaker.on_success(now)
    }

    /// A live request failed.
    pub fn record_failure(&self, policy: &BreakerPolicy, now: Instant) -> FailureOutcome {
        let mut state = self.lock();
        state.failed_requests += 1;
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        let consecutive_failures = state.consecutive_failures;
        FailureOutcome {
            consecutive_failures,
            transition: state.breaker.on_failure(policy, consecutive_failures, now),
        }
    }

    /// A health probe finished.
    pub fn record_probe(&self, healthy: bool, policy: &BreakerPolicy, now: Instant) -> ProbeOutcome {
        let mut state = self.lock();
        state.last_health_check = Some(SystemTime::now());
        let health_changed = (state.healthy != healthy).then_some(healthy);
        state.healthy = healthy;

        let transition = if healthy {
            state.consecutive_failures = 0;
            state.breaker.on_probe_success(now)
        } else {
            state.consecutive_failures = state.consecutive_failures.saturating_add(1);
            let failures = state.consecutive_failures;
            state.breaker.on_failure(policy, failures, now)
        };

        ProbeOutcome {
            health_changed,
            consecutive_failures: state.consecutive_failures,
            transition,
        }
    }

    pub fn snapshot(&self) -> BackendSnapshot {
        let state = self.lock();
        BackendSnapshot {
            endpoint: self.endpoint.clone(),
            weight: self.weight,
            healthy: state.healthy,
            circuit_state: state.breaker.state(),
            consecutive_failures: state.consecutive_failures,
            active_connections: self.active_connections(),
            response_time_ms: state.response_time_ms,
            total_requests: state.total_requests,
            successful_requests: state.successful_requests,
            failed_requests: state.failed_requests,
            last_health_check: state.last_health_check.map(unix_millis),
            ms_since_circuit_transition: Instant::now()
                .saturating_duration_since(state.breaker.last_transition())
                .as_millis() as u64,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().expect("backend state mutex poisoned")
    }
}

/// A RAII guard that manages the active connection count.
///
/// A guard dropped before [`ConnectionGuard::settle`] (cancelled request,
/// panicking transport) hands its half-open trial back to the breaker.
#[derive(Debug)]
pub struct ConnectionGuard {
    backend: Arc<Backend>,
    trial: Option<Instant>,
    settled: bool,
}

impl ConnectionGuard {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    /// Mark the attempt's outcome as recorded.
    pub fn settle(&mut self) {
        self.settled = true;
    }
}

impl Deref for ConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if let (false, Some(window)) = (self.settled, self.trial) {
            self.backend.return_trial(window);
        }
        self.backend.release();
    }
}
