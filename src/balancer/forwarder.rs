//! Request forwarding with retry.
//!
//! # Responsibilities
//! - Run the select → dispatch → record loop for one client request
//! - Sleep `backoff_ms * attempt` between attempts
//! - Bind a sticky session on first success

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};

use crate::balancer::{Balancer, BalancerError, RequestContext};
use crate::load_balancer::Backend;
use crate::observability::{metrics, BalancerEvent};
use crate::resilience::retries::is_failure_status;
use crate::resilience::timeouts::with_deadline;
use crate::transport::{ProxyRequest, ProxyResponse, TransportError};

/// A successfully forwarded request.
#[derive(Debug)]
pub struct Forwarded {
    pub response: ProxyResponse,
    /// Backend that produced the response.
    pub endpoint: String,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// Newly issued session token, if one was bound.
    pub session_token: Option<String>,
}

impl Balancer {
    /// Forward one client request, retrying across backends.
    pub async fn forward(
        &self,
        request: ProxyRequest,
        ctx: &RequestContext,
    ) -> Result<Forwarded, BalancerError> {
        let started = Instant::now();
        self.stats.record_request();

        let mut attempt = 1;
        loop {
            let (endpoint, result) = match self.select(ctx) {
                Ok(backend) => {
                    let endpoint = backend.endpoint().to_string();
                    let result = self.dispatch(backend, request.clone()).await;
                    (Some(endpoint), result)
                }
                Err(e) => {
                    tracing::warn!(attempt, "No healthy backend available");
                    self.events.emit(BalancerEvent::RequestThrottled { attempt });
                    (None, Err(e))
                }
            };

            match result {
                Ok((response, latency)) => {
                    let endpoint = endpoint.unwrap_or_default();
                    self.stats.record_success(latency);
                    metrics::record_request("success", attempt, started.elapsed());
                    tracing::debug!(
                        endpoint = %endpoint,
                        attempt,
                        status = %response.status,
                        latency_ms = latency.as_millis() as u64,
                        "Request forwarded"
                    );

                    let session_token = self.bind_session(ctx, &endpoint);
                    return Ok(Forwarded {
                        response,
                        endpoint,
                        attempts: attempt,
                        session_token,
                    });
                }
                Err(err) => match self.retry.next_delay(attempt) {
                    Some(delay) => {
                        self.stats.record_retry();
                        metrics::record_retry();
                        tracing::info!(
                            attempt,
                            endpoint = endpoint.as_deref().unwrap_or("-"),
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "Retrying request"
                        );
                        self.events.emit(BalancerEvent::RequestRetried {
                            attempt,
                            endpoint,
                            delay_ms: delay.as_millis() as u64,
                        });
                        time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => {
                        self.stats.record_failure();
                        metrics::record_request("failure", attempt, started.elapsed());
                        tracing::warn!(attempts = attempt, error = %err, "Request failed");
                        return Err(BalancerError::RetriesExhausted {
                            attempts: attempt,
                            last: Box::new(err),
                        });
                    }
                },
            }
        }
    }

    /// One attempt against one backend.
    async fn dispatch(
        &self,
        backend: Arc<Backend>,
        request: ProxyRequest,
    ) -> Result<(ProxyResponse, Duration), BalancerError> {
        let mut guard = backend.acquire();
        metrics::record_active_connections(guard.endpoint(), guard.active_connections());

        let started = Instant::now();
        let outcome = with_deadline(
            self.request_timeout,
            self.transport.send(guard.endpoint(), request, self.request_timeout),
        )
        .await
        .and_then(|response| {
            if is_failure_status(response.status) {
                Err(TransportError::UpstreamStatus(response.status))
            } else {
                Ok(response)
            }
        });
        let latency = started.elapsed();

        let result = match outcome {
            Ok(response) => {
                self.registry.record_success(&guard, latency);
                Ok((response, latency))
            }
            Err(source) => {
                self.registry.record_failure(&guard);
                Err(BalancerError::Transport {
                    endpoint: guard.endpoint().to_string(),
                    source,
                })
            }
        };
        guard.settle();

        drop(guard);
        metrics::record_active_connections(backend.endpoint(), backend.active_connections());
        result
    }

    /// Issue a token only when affinity is on and the client presented none.
    fn bind_session(&self, ctx: &RequestContext, endpoint: &str) -> Option<String> {
        if !self.sessions.is_enabled() || ctx.session_token.is_some() {
            return None;
        }
        Some(self.sessions.bind(endpoint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::http::StatusCode;
    use futures_util::future::BoxFuture;

    use crate::config::{
        Algorithm, BackendConfig, BalancerConfig, RetryConfig, SessionAffinityConfig,
    };
    use crate::transport::Transport;

    /// Returns queued statuses in order, then 200.
    #[derive(Default)]
    struct Queued {
        statuses: Mutex<Vec<StatusCode>>,
        seen: Mutex<Vec<String>>,
    }

    impl Transport for Queued {
        fn send<'a>(
            &'a self,
            endpoint: &'a str,
            _request: ProxyRequest,
            _timeout: Duration,
        ) -> BoxFuture<'a, Result<ProxyResponse, TransportError>> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(endpoint.to_string());
                let mut statuses = self.statuses.lock().unwrap();
                let status = if statuses.is_empty() {
                    StatusCode::OK
                } else {
                    statuses.remove(0)
                };
                Ok(ProxyResponse::new(status, endpoint.to_string()))
            })
        }
    }

    fn balancer(transport: Arc<Queued>, sessions: bool) -> Balancer {
        let config = BalancerConfig {
            algorithm: Algorithm::RoundRobin,
            backends: vec![
                BackendConfig::new("http://a:1", 1),
                BackendConfig::new("http://b:1", 1),
            ],
            retry: RetryConfig {
                backoff_ms: 10,
                ..Default::default()
            },
            session_affinity: SessionAffinityConfig {
                enabled: sessions,
                ..Default::default()
            },
            ..Default::default()
        };
        Balancer::from_config(&config, transport).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_status_is_retried_on_next_backend() {
        let transport = Arc::new(Queued {
            statuses: Mutex::new(vec![StatusCode::BAD_GATEWAY]),
            ..Default::default()
        });
        let lb = balancer(transport.clone(), false);

        let forwarded = lb.forward(ProxyRequest::get("/"), &RequestContext::new()).await.unwrap();
        assert_eq!(forwarded.attempts, 2);
        assert_eq!(forwarded.endpoint, "http://b:1");
        assert_eq!(*transport.seen.lock().unwrap(), vec!["http://a:1", "http://b:1"]);

        let a = lb.registry().get("http://a:1").unwrap().snapshot();
        assert_eq!(a.failed_requests, 1);
        assert_eq!(a.consecutive_failures, 1);

        let stats = lb.stats().global;
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.successful_requests, 1);
        assert_eq!(stats.retried_attempts, 1);
    }

    #[tokio::test]
    async fn test_application_errors_pass_through() {
        let transport = Arc::new(Queued {
            statuses: Mutex::new(vec![StatusCode::INTERNAL_SERVER_ERROR]),
            ..Default::default()
        });
        let lb = balancer(transport, false);

        let forwarded = lb.forward(ProxyRequest::get("/"), &RequestContext::new()).await.unwrap();
        assert_eq!(forwarded.attempts, 1);
        assert_eq!(forwarded.response.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_session_bound_only_without_token() {
        let transport = Arc::new(Queued::default());
        let lb = balancer(transport, true);

        let first = lb.forward(ProxyRequest::get("/"), &RequestContext::new()).await.unwrap();
        let token = first.session_token.expect("token issued");

        let ctx = RequestContext::new().with_session_token(token);
        for _ in 0..3 {
            let again = lb.forward(ProxyRequest::get("/"), &ctx).await.unwrap();
            assert_eq!(again.endpoint, first.endpoint);
            assert!(again.session_token.is_none());
        }
        assert_eq!(lb.sessions().active_count(), 1);
    }

    #[tokio::test]
    async fn test_connections_released_after_forward() {
        let transport = Arc::new(Queued::default());
        let lb = balancer(transport, false);
        lb.forward(ProxyRequest::get("/"), &RequestContext::new()).await.unwrap();
        assert!(lb.registry().all().iter().all(|b| b.active_connections() == 0));
    }
}
