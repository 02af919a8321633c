//! Typed balancer events.
//!
//! Components publish on one broadcast channel; external consumers (alerting,
//! metrics pipelines, tests) subscribe. Publishing never blocks and never
//! fails: with no subscribers the event is dropped, and slow subscribers see
//! `RecvError::Lagged` instead of stalling the balancer.

use serde::Serialize;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 1024;

/// Something observable happened inside the balancer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BalancerEvent {
    HealthCheckCompleted {
        endpoint: String,
        healthy: bool,
        latency_ms: u64,
    },
    ServerBecameHealthy {
        endpoint: String,
    },
    ServerBecameUnhealthy {
        endpoint: String,
        consecutive_failures: u32,
    },
    CircuitOpened {
        endpoint: String,
        consecutive_failures: u32,
    },
    CircuitHalfOpened {
        endpoint: String,
    },
    CircuitClosed {
        endpoint: String,
    },
    /// No backend was eligible for an attempt.
    RequestThrottled {
        attempt: u32,
    },
    RequestRetried {
        attempt: u32,
        endpoint: Option<String>,
        delay_ms: u64,
    },
}

/// Broadcast channel shared by every publisher.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BalancerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BalancerEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: BalancerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::default();
        bus.emit(BalancerEvent::RequestThrottled { attempt: 1 });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_events_in_order() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(BalancerEvent::CircuitOpened { endpoint: "a".into(), consecutive_failures: 5 });
        bus.emit(BalancerEvent::CircuitClosed { endpoint: "a".into() });

        assert!(matches!(rx.recv().await.unwrap(), BalancerEvent::CircuitOpened { .. }));
        assert!(matches!(rx.recv().await.unwrap(), BalancerEvent::CircuitClosed { .. }));
    }

    #[test]
    fn test_serializes_with_tag() {
        let json = serde_json::to_value(BalancerEvent::ServerBecameHealthy { endpoint: "a".into() }).unwrap();
        assert_eq!(json["event"], "server_became_healthy");
        assert_eq!(json["endpoint"], "a");
    }
}
