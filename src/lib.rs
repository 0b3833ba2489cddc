//! Client-side load balancer for cluster services.
//!
//! Discovers the endpoints of a service, admits callers under a bounded
//! backlog, gives each request exclusive use of one idle endpoint and releases
//! it when the response body is consumed or dropped.

pub mod config;
pub mod discovery;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;

pub use config::BalancerConfig;
pub use lifecycle::Shutdown;
pub use load_balancer::{Pool, PoolError};
