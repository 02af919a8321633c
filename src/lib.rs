//! Backend load balancer library.
//!
//! Routes requests across a static pool of backends with health probing,
//! per-backend circuit breaking, four selection algorithms, optional sticky
//! sessions and bounded retry with linear backoff.

// Core
pub mod balancer;
pub mod config;
pub mod transport;

// Traffic management
pub mod health;
pub mod load_balancer;
pub mod session;

// Surfaces
pub mod admin;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use balancer::{Balancer, BalancerError, Forwarded, RequestContext};
pub use config::schema::BalancerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use transport::{HttpTransport, ProxyRequest, ProxyResponse, SimulatedTransport, Transport};
