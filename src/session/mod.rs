//! Session affinity subsystem.
//!
//! # Data Flow
//! ```text
//! Request with token → affinity.rs lookup
//!     → pinned backend still eligible? route there
//!     → otherwise fall through to the load balancing algorithm
//!
//! Successful response, no token presented (affinity enabled)
//!     → affinity.rs bind → token returned to the client
//!
//! Sweeper task (interval) → drop expired tokens
//! ```

pub mod affinity;

pub use affinity::{SessionAffinity, SessionRecord};
