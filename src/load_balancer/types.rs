//! Pool error and diagnostic types.

use serde::Serialize;
use thiserror::Error;

use crate::http::client::BoxError;

/// Errors returned to callers of the pool.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The wait queue was full at admission time.
    #[error("overfilled wait queue ({capacity} callers already waiting)")]
    AdmissionRejected { capacity: usize },

    /// The pool closed before a target was assigned.
    #[error("balancer shutting down")]
    ShuttingDown,

    /// The outbound request could not be built for the assigned target.
    #[error("failed to build outbound request: {0}")]
    Request(#[from] axum::http::Error),

    /// The transport failed to deliver the request.
    #[error("transport error: {0}")]
    Transport(#[source] BoxError),
}

/// Result type for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Diagnostic view of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStatus {
    pub name: String,
    pub uid: String,
    pub address: String,
    pub busy: bool,
}

/// Lifetime counters of a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Callers accepted into the wait queue.
    pub admitted: u64,
    /// Callers turned away because the queue was full.
    pub rejected: u64,
    /// Targets handed to a waiting caller.
    pub assigned: u64,
    /// Busy set removals.
    pub released: u64,
    /// Successful discovery refreshes applied.
    pub refreshes: u64,
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, Serialize)]
pub struct PoolSnapshot {
    pub targets: Vec<TargetStatus>,
    pub busy: usize,
    pub waiting: usize,
    pub max_waiting: usize,
    pub closed: bool,
    pub stats: PoolStats,
}
