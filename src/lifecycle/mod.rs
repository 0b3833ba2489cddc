//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() or last handle dropped
//!     → discovery loop stops → pool closed → waiting callers get ShuttingDown
//!
//! Signals (signals.rs):
//!     Ctrl-C → Shutdown::trigger
//! ```
//!
//! # Design Decisions
//! - The trigger fires once; late subscribers still observe it
//! - In-flight requests are not interrupted; they release normally

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
