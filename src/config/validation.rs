//! Configuration validation.
//!
//! Serde handles syntax (including unknown algorithm names); this module
//! checks semantics. Every problem is reported, not just the first.

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{Algorithm, BalancerConfig};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("no backends configured")]
    NoBackends,

    #[error("backend #{index} has an empty endpoint")]
    EmptyEndpoint { index: usize },

    #[error("duplicate backend endpoint '{0}'")]
    DuplicateEndpoint(String),

    #[error("backend endpoint '{endpoint}' is not a valid URL: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("weighted_round_robin requires at least one backend with weight > 0")]
    AllWeightsZero,

    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("health_check.path '{0}' must start with '/'")]
    InvalidProbePath(String),

    #[error("health_check.expected_status {0} is not a valid HTTP status")]
    InvalidExpectedStatus(u16),

    #[error("session_affinity.cookie_name must not be empty")]
    EmptyCookieName,
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.backends.is_empty() {
        errors.push(ValidationError::NoBackends);
    }

    let mut seen = HashSet::new();
    for (index, backend) in config.backends.iter().enumerate() {
        let endpoint = backend.endpoint.trim();
        if endpoint.is_empty() {
            errors.push(ValidationError::EmptyEndpoint { index });
            continue;
        }
        if !seen.insert(endpoint) {
            errors.push(ValidationError::DuplicateEndpoint(endpoint.to_string()));
        }
        match Url::parse(endpoint) {
            Ok(url) if url.host_str().is_none() => {
                errors.push(ValidationError::InvalidEndpoint {
                    endpoint: endpoint.to_string(),
                    reason: "missing host".to_string(),
                });
            }
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    if config.algorithm == Algorithm::WeightedRoundRobin
        && !config.backends.is_empty()
        && config.backends.iter().all(|b| b.weight == 0)
    {
        errors.push(ValidationError::AllWeightsZero);
    }

    let hc = &config.health_check;
    if hc.enabled {
        if hc.interval_secs == 0 {
            errors.push(ValidationError::Zero { field: "health_check.interval_secs" });
        }
        if hc.timeout_secs == 0 {
            errors.push(ValidationError::Zero { field: "health_check.timeout_secs" });
        }
        if !hc.path.starts_with('/') {
            errors.push(ValidationError::InvalidProbePath(hc.path.clone()));
        }
        if !(100..=599).contains(&hc.expected_status) {
            errors.push(ValidationError::InvalidExpectedStatus(hc.expected_status));
        }
    }

    let cb = &config.circuit_breaker;
    if cb.enabled {
        if cb.failure_threshold == 0 {
            errors.push(ValidationError::Zero { field: "circuit_breaker.failure_threshold" });
        }
        if cb.half_open_max_requests == 0 {
            errors.push(ValidationError::Zero { field: "circuit_breaker.half_open_max_requests" });
        }
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero { field: "timeouts.request_secs" });
    }

    let sa = &config.session_affinity;
    if sa.enabled {
        if sa.cookie_name.trim().is_empty() {
            errors.push(ValidationError::EmptyCookieName);
        }
        if sa.ttl_secs == 0 {
            errors.push(ValidationError::Zero { field: "session_affinity.ttl_secs" });
        }
        if sa.sweep_interval_secs == 0 {
            errors.push(ValidationError::Zero { field: "session_affinity.sweep_interval_secs" });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BackendConfig;

    fn config_with(backends: Vec<BackendConfig>) -> BalancerConfig {
        BalancerConfig {
            backends,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        let config = config_with(vec![
            BackendConfig::new("http://127.0.0.1:3000", 1),
            BackendConfig::new("http://127.0.0.1:3001", 2),
        ]);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_backend_list() {
        let errors = validate_config(&config_with(vec![])).unwrap_err();
        assert_eq!(errors, vec![ValidationError::NoBackends]);
    }

    #[test]
    fn test_reports_every_problem() {
        let mut config = config_with(vec![
            BackendConfig::new("http://a:1", 1),
            BackendConfig::new("http://a:1", 1),
            BackendConfig::new("not a url", 1),
            BackendConfig::new("  ", 1),
        ]);
        config.circuit_breaker.failure_threshold = 0;

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::DuplicateEndpoint("http://a:1".into())));
        assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidEndpoint { .. })));
        assert!(errors.contains(&ValidationError::EmptyEndpoint { index: 3 }));
        assert!(errors.contains(&ValidationError::Zero { field: "circuit_breaker.failure_threshold" }));
    }

    #[test]
    fn test_weighted_needs_a_positive_weight() {
        let mut config = config_with(vec![BackendConfig::new("http://a:1", 0)]);
        config.algorithm = Algorithm::WeightedRoundRobin;
        assert_eq!(validate_config(&config).unwrap_err(), vec![ValidationError::AllWeightsZero]);

        config.algorithm = Algorithm::RoundRobin;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_disabled_sections_are_not_checked() {
        let mut config = config_with(vec![BackendConfig::new("http://a:1", 1)]);
        config.health_check.enabled = false;
        config.health_check.interval_secs = 0;
        config.session_affinity.cookie_name = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
