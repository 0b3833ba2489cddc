//! Target discovery subsystem.
//!
//! # Data Flow
//! ```text
//! poller.rs (fixed interval, first tick immediate)
//!     → Refresher::list_endpoints(selector)
//!         - endpoints.rs: GET /api/v1/namespaces/{ns}/endpoints/{svc}
//!           (credentials.rs: bearer token + CA bundle)
//!     → Ok: Pool registry replaced, backlog served
//!     → Err: tick skipped, previous registry kept
//!
//! Shutdown signal → pool closed → loop stopped (terminal)
//! ```
//!
//! # Design Decisions
//! - Discovery errors never reach callers; stale topology beats no topology
//! - The loop holds a weak pool reference and exits once the pool is dropped

pub mod credentials;
pub mod endpoints;
pub mod poller;

use axum::http::StatusCode;
use futures_util::future::BoxFuture;
use thiserror::Error;

pub use crate::config::schema::Selector;
use crate::load_balancer::target::Target;
pub use endpoints::EndpointRefresher;

/// Lists the current targets of a service.
pub trait Refresher: Send + Sync + 'static {
    fn list_endpoints<'a>(
        &'a self,
        selector: &'a Selector,
    ) -> BoxFuture<'a, Result<Vec<Target>, DiscoveryError>>;
}

/// Errors that can occur while discovering targets.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Reading a credential file failed.
    #[error("failed to read {path}: {source}")]
    Credentials {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The CA bundle could not be used.
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// The endpoints URL could not be built.
    #[error("invalid API server URL: {0}")]
    Url(#[from] url::ParseError),

    /// The HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API server answered with a non-success status.
    #[error("API server returned {0}")]
    Status(StatusCode),

    /// The response body was not a valid endpoints object.
    #[error("failed to decode endpoints: {0}")]
    Decode(#[from] serde_json::Error),
}
