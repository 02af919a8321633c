//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarding attempt:
//!     → timeouts.rs (hard deadline around the transport call)
//!     → On failure: circuit_breaker.rs (per-backend state machine)
//!     → retries.rs (attempt budget) + backoff.rs (linear delay)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Circuit breaker state lives inside each backend record
//! - Open circuits are skipped at selection time, never surfaced as errors

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerPolicy, CircuitBreaker, CircuitState, Transition};
pub use retries::RetryPolicy;
