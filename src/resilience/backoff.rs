//! Linear backoff between forwarding attempts.

use std::time::Duration;

/// Delay before the attempt that follows `attempt` (1-based): `step * attempt`.
pub fn linear_backoff(step_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(step_ms.saturating_mul(u64::from(attempt)))
}
