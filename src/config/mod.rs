//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BalancerConfig (validated, immutable)
//!     → pool, discovery, transport, observability
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use schema::BalancerConfig;
pub use schema::DiscoveryConfig;
pub use schema::ObservabilityConfig;
pub use schema::PoolConfig;
pub use schema::Selector;
pub use schema::TransportConfig;
