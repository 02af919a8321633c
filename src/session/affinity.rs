//! Sticky session store.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::{self, Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::config::SessionAffinityConfig;
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

/// A token's pinned backend.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub endpoint: String,
    pub created_at: Instant,
}

/// Maps session tokens to backends for a fixed TTL.
#[derive(Debug)]
pub struct SessionAffinity {
    enabled: bool,
    cookie_name: String,
    ttl: Duration,
    sweep_interval: Duration,
    sessions: DashMap<String, SessionRecord>,
}

impl SessionAffinity {
    pub fn new(config: &SessionAffinityConfig) -> Self {
        Self {
            enabled: config.enabled,
            cookie_name: config.cookie_name.clone(),
            ttl: config.ttl(),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
            sessions: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Pinned endpoint for `token`, purging the entry if it has expired.
    pub fn lookup(&self, token: &str) -> Option<String> {
        let now = Instant::now();
        {
            // The read guard must be gone before removing from the same shard.
            let record = self.sessions.get(token)?;
            if !self.is_expired(&record, now) {
                return Some(record.endpoint.clone());
            }
        }
        if let Some((_, record)) = self
            .sessions
            .remove_if(token, |_, record| self.is_expired(record, now))
        {
            tracing::debug!(endpoint = %record.endpoint, "Expired session purged on lookup");
        }
        None
    }

    /// Issue a new token pinned to `endpoint`.
    pub fn bind(&self, endpoint: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(
            token.clone(),
            SessionRecord {
                endpoint: endpoint.to_string(),
                created_at: Instant::now(),
            },
        );
        tracing::debug!(endpoint = %endpoint, "Session created");
        metrics::record_sessions(self.sessions.len());
        token
    }

    /// Drop every expired session. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, record| !self.is_expired(record, now));
        let removed = before.saturating_sub(self.sessions.len());
        metrics::record_sessions(self.sessions.len());
        removed
    }

    /// Unexpired sessions. Expired entries awaiting a sweep are not counted.
    pub fn active_count(&self) -> usize {
        let now = Instant::now();
        self.sessions
            .iter()
            .filter(|entry| !self.is_expired(entry.value(), now))
            .count()
    }

    /// Periodically sweep expired sessions until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, mut shutdown: ShutdownSignal) {
        let mut ticker = time::interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.active_count(), "Session sweep");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Session sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    fn is_expired(&self, record: &SessionRecord, now: Instant) -> bool {
        now.saturating_duration_since(record.created_at) >= self.ttl
    }
}
