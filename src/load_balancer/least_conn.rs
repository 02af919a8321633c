//! Least Connections load balancing strategy.

use std::sync::Arc;

use crate::load_balancer::{Backend, LoadBalancer, SelectionContext, ServerRegistry};

/// Least connections selector.
/// Selects the eligible backend with the minimum number of active connections.
#[derive(Debug, Default)]
pub struct LeastConnections;

impl LeastConnections {
    pub fn new() -> Self {
        Self
    }
}

impl LoadBalancer for LeastConnections {
    fn name(&self) -> &'static str {
        "least_connections"
    }

    fn next_server(
        &self,
        registry: &ServerRegistry,
        _ctx: &SelectionContext<'_>,
    ) -> Option<Arc<Backend>> {
        // min_by_key keeps the first of equal minimums
        registry
            .eligible()
            .into_iter()
            .min_by_key(|b| b.active_connections())
    }
}
