//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use upstream_balancer::balancer::Balancer;
use upstream_balancer::config::{BackendConfig, BalancerConfig};
use upstream_balancer::http::HttpServer;
use upstream_balancer::lifecycle::Shutdown;
use upstream_balancer::transport::{ProxyRequest, ProxyResponse, Transport, TransportError};

/// What a scripted backend does on each call.
#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Status(u16),
    Refused,
    /// Answer 200 after a delay.
    Slow(Duration),
}

/// In-process transport with per-endpoint behavior and a call log.
#[derive(Default)]
pub struct ScriptedTransport {
    outcomes: Mutex<HashMap<String, Outcome>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Set the behavior of `endpoint`. Unscripted endpoints answer 200.
    pub fn set(&self, endpoint: &str, outcome: Outcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(endpoint.to_string(), outcome);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|e| *e == endpoint).count()
    }
}

impl Transport for ScriptedTransport {
    fn send<'a>(
        &'a self,
        endpoint: &'a str,
        _request: ProxyRequest,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<ProxyResponse, TransportError>> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(endpoint.to_string());
            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .get(endpoint)
                .copied()
                .unwrap_or(Outcome::Status(200));

            match outcome {
                Outcome::Status(code) => {
                    let status = StatusCode::from_u16(code).unwrap();
                    Ok(ProxyResponse::new(status, endpoint.to_string()))
                }
                Outcome::Refused => Err(TransportError::Connect("connection refused".into())),
                Outcome::Slow(delay) => {
                    if delay >= timeout {
                        tokio::time::sleep(timeout).await;
                        return Err(TransportError::Timeout(timeout));
                    }
                    tokio::time::sleep(delay).await;
                    Ok(ProxyResponse::new(StatusCode::OK, endpoint.to_string()))
                }
            }
        })
    }
}

/// Config with the given endpoints, health checks off.
pub fn config(endpoints: &[&str]) -> BalancerConfig {
    let mut config = BalancerConfig {
        backends: endpoints.iter().map(|e| BackendConfig::new(*e, 1)).collect(),
        ..Default::default()
    };
    config.health_check.enabled = false;
    config
}

/// Start a programmable mock backend on an ephemeral port.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        read_request_head(&mut socket).await;
                        let (status, body) = f().await;
                        let reason = StatusCode::from_u16(status)
                            .ok()
                            .and_then(|s| s.canonical_reason())
                            .unwrap_or("OK");

                        let response_str = format!(
                            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status,
                            reason,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock backend that always answers 200 with `body`.
pub async fn start_mock_backend(body: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, body.to_string()) }).await
}

async fn read_request_head(socket: &mut tokio::net::TcpStream) {
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
}

/// Serve the front door for `balancer` on an ephemeral port.
pub async fn start_front(
    balancer: Arc<Balancer>,
    config: &BalancerConfig,
    shutdown: &Shutdown,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = HttpServer::new(balancer, config);
    let signal = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, signal).await;
    });
    addr
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
