//! Request statistics.

use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::load_balancer::backend::BackendSnapshot;

/// Aggregate counters across all client requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub retried_attempts: u64,
    /// Running mean over successful requests only.
    pub average_response_time_ms: f64,
    /// Milliseconds since the Unix epoch.
    pub last_reset: u64,
}

impl GlobalStats {
    fn new() -> Self {
        Self {
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            retried_attempts: 0,
            average_response_time_ms: 0.0,
            last_reset: unix_millis(SystemTime::now()),
        }
    }
}

/// Full view served by the admin surface.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub global: GlobalStats,
    pub algorithm: &'static str,
    pub active_sessions: usize,
    pub backends: Vec<BackendSnapshot>,
}

/// Thread-safe owner of [`GlobalStats`].
#[derive(Debug)]
pub struct StatsAggregator {
    inner: Mutex<GlobalStats>,
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(GlobalStats::new()),
        }
    }

    pub fn record_request(&self) {
        self.with(|s| s.total_requests += 1);
    }

    pub fn record_success(&self, latency: Duration) {
        let sample = latency.as_secs_f64() * 1000.0;
        self.with(|s| {
            s.successful_requests += 1;
            s.average_response_time_ms +=
                (sample - s.average_response_time_ms) / s.successful_requests as f64;
        });
    }

    pub fn record_failure(&self) {
        self.with(|s| s.failed_requests += 1);
    }

    pub fn record_retry(&self) {
        self.with(|s| s.retried_attempts += 1);
    }

    pub fn reset(&self) {
        self.with(|s| *s = GlobalStats::new());
    }

    pub fn snapshot(&self) -> GlobalStats {
        self.with(|s| s.clone())
    }

    fn with<R>(&self, f: impl FnOnce(&mut GlobalStats) -> R) -> R {
        let mut stats = self.inner.lock().expect("stats mutex poisoned");
        f(&mut stats)
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn unix_millis(at: SystemTime) -> u64 {
    at.duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}
