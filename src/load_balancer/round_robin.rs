//! Round-robin load balancing strategy.
//!
//! The cursor walks the full static backend list and skips ineligible
//! entries. When some backends are ineligible, the backend following them
//! absorbs their turns until they return.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::load_balancer::{Backend, LoadBalancer, SelectionContext, ServerRegistry};

/// Round-robin selector.
/// Stores an internal counter to rotate through backends.
#[derive(Debug, Default)]
pub struct RoundRobin {
    counter: AtomicUsize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancer for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn next_server(
        &self,
        registry: &ServerRegistry,
        _ctx: &SelectionContext<'_>,
    ) -> Option<Arc<Backend>> {
        let backends = registry.all();
        if backends.is_empty() {
            return None;
        }

        let start = self.counter.fetch_add(1, Ordering::Relaxed);
        let len = backends.len();

        (0..len)
            .map(|i| &backends[start.wrapping_add(i) % len])
            .find(|backend| registry.is_eligible(backend))
            .cloned()
    }
}
