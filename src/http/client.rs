//! Outbound transport.
//!
//! # Responsibilities
//! - Define the seam the pool forwards requests through
//! - Provide the pooled hyper client used in production
//!
//! # Design Decisions
//! - Object safe (boxed futures) so a pool can hold `Arc<dyn Transport>`
//! - Bodies are `axum::body::Body` on both sides

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::TransportConfig;

/// Type-erased error returned by transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sends a fully addressed request and returns the response.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, BoxError>>;
}

/// Pooled HTTP/1.1 client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
}

impl HyperTransport {
    /// Build a client from the transport settings.
    pub fn new(config: &TransportConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        connector.set_keepalive(Some(Duration::from_secs(config.keepalive_secs)));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .pool_max_idle_per_host(config.max_idle_per_host)
            .build(connector);

        Self { client }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new(&TransportConfig::default())
    }
}

impl Transport for HyperTransport {
    fn send(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, BoxError>> {
        let client = self.client.clone();
        Box::pin(async move {
            let response = client.request(request).await?;
            Ok(response.map(Body::new))
        })
    }
}
