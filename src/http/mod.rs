//! HTTP plumbing subsystem.
//!
//! # Data Flow
//! ```text
//! caller's request (borrowed)
//!     → request.rs (rewrite destination to assigned target)
//!     → client.rs (Transport::send)
//!     → response, body wrapped by the pool
//! ```

pub mod client;
pub mod request;

pub use client::{BoxError, HyperTransport, Transport};
pub use request::rewrite_request;
