//! Forwarding errors.

use thiserror::Error;

use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum BalancerError {
    /// The eligible set was empty at selection time.
    #[error("no healthy backend available")]
    NoHealthyBackend,

    #[error("backend {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: TransportError,
    },

    #[error("request failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<BalancerError>,
    },
}

impl BalancerError {
    /// The innermost single-attempt error.
    pub fn root(&self) -> &BalancerError {
        match self {
            BalancerError::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), BalancerError::Transport { source, .. } if source.is_timeout())
    }

    pub fn is_no_healthy_backend(&self) -> bool {
        matches!(self.root(), BalancerError::NoHealthyBackend)
    }

    pub fn attempts(&self) -> u32 {
        match self {
            BalancerError::RetriesExhausted { attempts, .. } => *attempts,
            _ => 1,
        }
    }
}
