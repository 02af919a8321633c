//! Timeout enforcement for transport calls.
//!
//! Transports receive their timeout as an argument; every probe and every
//! forwarding attempt is additionally wrapped here.

use std::future::Future;
use std::time::Duration;

use tokio::time;

use crate::transport::TransportError;

/// Run a transport call under a hard deadline.
pub async fn with_deadline<F, T>(limit: Duration, call: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    match time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_elapses() {
        let slow = async {
            time::sleep(Duration::from_secs(10)).await;
            Ok::<_, TransportError>(())
        };
        let err = with_deadline(Duration::from_secs(1), slow).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(d) if d == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_inner_result_passes_through() {
        let ok = with_deadline(Duration::from_secs(1), async { Ok::<_, TransportError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);
    }
}
