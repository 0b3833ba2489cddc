//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use futures_util::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use kube_balance::config::PoolConfig;
use kube_balance::discovery::{DiscoveryError, Refresher, Selector};
use kube_balance::http::{BoxError, Transport};
use kube_balance::load_balancer::{Target, TargetKey};

pub fn target(name: &str, port: u16) -> Target {
    Target::new(TargetKey::new(name, format!("uid-{}", name)), "127.0.0.1", port)
}

pub fn pool_config(max_waiting: usize, interval_ms: u64) -> PoolConfig {
    let mut config = PoolConfig {
        interval_ms,
        max_waiting,
        ..PoolConfig::default()
    };
    config.selector = Selector {
        namespace: "default".into(),
        service: "kube-balance".into(),
    };
    config
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Refresher that plays back a fixed script, repeating the last round.
pub struct ScriptedRefresher {
    rounds: Mutex<VecDeque<Result<Vec<Target>, StatusCode>>>,
    calls: AtomicUsize,
}

impl ScriptedRefresher {
    pub fn new(rounds: Vec<Result<Vec<Target>, StatusCode>>) -> Arc<Self> {
        Arc::new(Self {
            rounds: Mutex::new(rounds.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Refresher for ScriptedRefresher {
    fn list_endpoints<'a>(
        &'a self,
        _selector: &'a Selector,
    ) -> BoxFuture<'a, Result<Vec<Target>, DiscoveryError>> {
        let round = {
            let mut rounds = self.rounds.lock().unwrap();
            let round = if rounds.len() > 1 {
                rounds.pop_front()
            } else {
                rounds.front().cloned()
            };
            round.unwrap_or_else(|| Ok(Vec::new()))
        };
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { round.map_err(DiscoveryError::Status) })
    }
}

/// In-memory transport answering with the authority it was sent to.
///
/// Records every authority and can hold each request for `delay`.
#[derive(Default)]
pub struct RecordingTransport {
    pub delay: Duration,
    sent: Mutex<Vec<String>>,
}

impl RecordingTransport {
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, BoxError>> {
        let authority = request
            .uri()
            .authority()
            .map(|a| a.to_string())
            .unwrap_or_default();
        self.sent.lock().unwrap().push(authority.clone());

        let delay = self.delay;
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok(Response::new(Body::from(authority)))
        })
    }
}

/// Start a mock HTTP/1.1 backend on an ephemeral port.
///
/// `f` receives the raw request head and returns `(status, content type, body)`.
/// Every connection is closed after one response.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, &'static str, String)> + Send + 'static,
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
                        let head = read_head(&mut socket).await;
                        let (status, content_type, body) = f(head).await;
                        let status_text = match status {
                            200 => "200 OK",
                            401 => "401 Unauthorized",
                            403 => "403 Forbidden",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            content_type,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// Start a mock backend answering every request with `name`.
pub async fn start_mock_backend(name: &'static str) -> SocketAddr {
    start_programmable_backend(move |_| async move { (200, "text/plain", name.to_string()) }).await
}

async fn read_head(socket: &mut tokio::net::TcpStream) -> String {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        match socket.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => head.extend_from_slice(&buf[..n]),
        }
    }
    String::from_utf8_lossy(&head).into_owned()
}
