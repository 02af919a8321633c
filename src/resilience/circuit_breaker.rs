//! Per-backend circuit breaker.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend isolated, skipped at selection time
//! - Half-Open: limited trial traffic while recovery is tested
//!
//! # State Transitions
//! ```text
//! Closed    → Open:      consecutive failures >= failure_threshold
//! Open      → Half-Open: reset_timeout elapsed (checked lazily) or probe success
//! Half-Open → Closed:    first successful live request
//! Half-Open → Open:      any failure; re-arms the reset timeout
//! ```
//!
//! The breaker holds no counters of its own: the owning backend record passes
//! in its consecutive failure count, so probe and live outcomes share one
//! tally.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;

/// Circuit state of one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        })
    }
}

/// Breaker thresholds shared by every backend.
#[derive(Debug, Clone, Copy)]
pub struct BreakerPolicy {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
    pub half_open_max_requests: u32,
}

impl From<&CircuitBreakerConfig> for BreakerPolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            enabled: config.enabled,
            failure_threshold: config.failure_threshold,
            reset_timeout: config.reset_timeout(),
            half_open_max_requests: config.half_open_max_requests,
        }
    }
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self::from(&CircuitBreakerConfig::default())
    }
}

/// A state change, reported so the caller can log and emit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Breaker state embedded in a backend record.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    last_transition: Instant,
    half_open_trials: u32,
}

impl CircuitBreaker {
    pub fn new(now: Instant) -> Self {
        Self {
            state: CircuitState::Closed,
            last_transition: now,
            half_open_trials: 0,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn last_transition(&self) -> Instant {
        self.last_transition
    }

    /// Whether the circuit currently admits a dispatch.
    pub fn admits(&self, policy: &BreakerPolicy) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => false,
            CircuitState::HalfOpen => self.half_open_trials < policy.half_open_max_requests,
        }
    }

    /// Lazy Open → Half-Open check, run at selection time.
    pub fn poll(&mut self, policy: &BreakerPolicy, now: Instant) -> Option<Transition> {
        if self.state == CircuitState::Open
            && now.saturating_duration_since(self.last_transition) >= policy.reset_timeout
        {
            return Some(self.move_to(CircuitState::HalfOpen, now));
        }
        None
    }

    /// Count a dispatch against the half-open trial allowance. Returns the
    /// half-open window the trial belongs to, if one was taken.
    pub fn on_dispatch(&mut self) -> Option<Instant> {
        if self.state == CircuitState::HalfOpen {
            self.half_open_trials = self.half_open_trials.saturating_add(1);
            return Some(self.last_transition);
        }
        None
    }

    /// Give back a trial that ended without an outcome. A trial taken in an
    /// earlier half-open window is ignored.
    pub fn on_trial_abandoned(&mut self, window: Instant) {
        if self.state == CircuitState::HalfOpen && self.last_transition == window {
            self.half_open_trials = self.half_open_trials.saturating_sub(1);
        }
    }

    /// A live request succeeded.
    pub fn on_success(&mut self, now: Instant) -> Option<Transition> {
        match self.state {
            CircuitState::HalfOpen => Some(self.move_to(CircuitState::Closed, now)),
            _ => None,
        }
    }

    /// A probe succeeded: an open circuit goes straight to half-open.
    pub fn on_probe_success(&mut self, now: Instant) -> Option<Transition> {
        match self.state {
            CircuitState::Open => Some(self.move_to(CircuitState::HalfOpen, now)),
            _ => None,
        }
    }

    /// A live request or probe failed. `consecutive_failures` already
    /// includes this failure.
    pub fn on_failure(
        &mut self,
        policy: &BreakerPolicy,
        consecutive_failures: u32,
        now: Instant,
    ) -> Option<Transition> {
        if !policy.enabled {
            return None;
        }
        match self.state {
            CircuitState::Closed if consecutive_failures >= policy.failure_threshold => {
                Some(self.move_to(CircuitState::Open, now))
            }
            CircuitState::HalfOpen => Some(self.move_to(CircuitState::Open, now)),
            _ => None,
        }
    }

    fn move_to(&mut self, to: CircuitState, now: Instant) -> Transition {
        let from = self.state;
        self.state = to;
        self.last_transition = now;
        self.half_open_trials = 0;
        Transition { from, to }
    }
}
