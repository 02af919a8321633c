//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Balancer::select
//!     → pool.rs (refresh lazy circuit transitions, eligibility)
//!     → Apply load balancing algorithm:
//!         - round_robin.rs (rotate through the static list)
//!         - least_conn.rs (pick backend with fewest connections)
//!         - weighted.rs (weighted random draw)
//!         - ip_hash.rs (client identifier hash)
//!     → backend.rs (connection guard for the chosen record)
//! ```
//!
//! # Design Decisions
//! - Algorithms hold no backend state; the registry owns it
//! - Ineligible backends (unhealthy or circuit open) are never returned
//! - `None` means the eligible set is empty

pub mod backend;
pub mod ip_hash;
pub mod least_conn;
pub mod pool;
pub mod round_robin;
pub mod weighted;

use std::fmt::Debug;
use std::sync::Arc;

use crate::config::Algorithm;

pub use self::backend::{Backend, BackendSnapshot, ConnectionGuard};
pub use self::ip_hash::IpHash;
pub use self::least_conn::LeastConnections;
pub use self::pool::ServerRegistry;
pub use self::round_robin::RoundRobin;
pub use self::weighted::WeightedRoundRobin;

/// Request attributes an algorithm may use.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectionContext<'a> {
    /// Client identifier, usually the client IP.
    pub client_id: Option<&'a str>,
}

/// A backend selection strategy.
pub trait LoadBalancer: Send + Sync + Debug {
    /// Config-file name of the strategy.
    fn name(&self) -> &'static str;

    /// Pick one eligible backend, or `None` if none is eligible.
    fn next_server(
        &self,
        registry: &ServerRegistry,
        ctx: &SelectionContext<'_>,
    ) -> Option<Arc<Backend>>;
}

/// Build the strategy for a configured algorithm.
pub fn build(algorithm: Algorithm) -> Box<dyn LoadBalancer> {
    match algorithm {
        Algorithm::RoundRobin => Box::new(RoundRobin::new()),
        Algorithm::LeastConnections => Box::new(LeastConnections::new()),
        Algorithm::WeightedRoundRobin => Box::new(WeightedRoundRobin::new()),
        Algorithm::IpHash => Box::new(IpHash::new()),
    }
}
