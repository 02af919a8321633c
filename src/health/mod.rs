//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe each backend through the transport, concurrently
//!     → ServerRegistry::record_probe (health flag, breaker, events)
//! ```
//!
//! # Design Decisions
//! - Probes are the only signal that changes a backend's health flag;
//!   live traffic drives the circuit breaker instead
//! - A probe never blocks the loop beyond its timeout per attempt

pub mod active;

pub use active::HealthMonitor;
