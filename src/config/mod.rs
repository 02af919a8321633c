//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → handed to Balancer::from_config at startup
//! ```
//!
//! # Design Decisions
//! - The backend list is static; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, Algorithm, BackendConfig, BalancerConfig, CircuitBreakerConfig,
    HealthCheckConfig, ListenerConfig, ObservabilityConfig, RetryConfig,
    SessionAffinityConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
