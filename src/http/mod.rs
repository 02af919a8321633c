//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing)
//!     → buffer body, derive client id and session cookie
//!     → Balancer::forward
//!     → response (plus Set-Cookie for a new session)
//! ```

pub mod server;

pub use server::{error_status, AppState, HttpServer, X_REQUEST_ID};
