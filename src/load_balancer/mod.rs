//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Pool::dispatch(request)
//!     → queue.rs (admit ticket, or reject when full)
//!     → pool.rs dispatcher (idle target from registry.rs ↔ oldest ticket)
//!     → wait for assignment or shutdown
//!     → forward via Transport
//!     → body.rs (release on end-of-stream or close)
//!     → dispatcher runs again for the backlog
//!
//! Discovery refresh → registry.rs replaced → dispatcher runs
//! ```
//!
//! # Design Decisions
//! - Each target serves at most one request at a time
//! - Callers are served in arrival order; target choice is random among idle
//! - Backpressure is immediate: a full queue rejects, it never blocks

pub mod body;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod target;
pub mod types;

pub use body::ReleaseBody;
pub use pool::{Assignment, Pool};
pub use target::{Target, TargetKey};
pub use types::{PoolError, PoolResult, PoolSnapshot, PoolStats, TargetStatus};
