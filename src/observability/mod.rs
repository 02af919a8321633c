//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Registry / HealthMonitor / Balancer produce:
//!     → tracing macros (structured log records)
//!     → metrics.rs (counters, gauges, histograms)
//!     → events.rs (typed broadcast for external consumers)
//!     → stats.rs (global counters behind the admin snapshot)
//! ```
//!
//! # Design Decisions
//! - Metrics are no-ops until a recorder is installed
//! - Events are fire-and-forget; publishers never wait on subscribers
//! - Stats are in-memory only and reset with the process

pub mod events;
pub mod logging;
pub mod metrics;
pub mod stats;

pub use events::{BalancerEvent, EventBus};
pub use stats::{GlobalStats, StatsAggregator, StatsSnapshot};
