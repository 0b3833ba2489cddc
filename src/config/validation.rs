//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (interval > 0) and address formats
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::BalancerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("pool.selector.namespace must not be empty")]
    EmptyNamespace,

    #[error("pool.selector.service must not be empty")]
    EmptyService,

    #[error("pool.interval_ms must be greater than zero")]
    ZeroInterval,

    #[error("discovery.api_server is not an http(s) URL: {0}")]
    InvalidApiServer(String),

    #[error("observability.metrics_address is not a socket address: {0}")]
    InvalidMetricsAddress(String),
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.pool.selector.namespace.trim().is_empty() {
        errors.push(ValidationError::EmptyNamespace);
    }
    if config.pool.selector.service.trim().is_empty() {
        errors.push(ValidationError::EmptyService);
    }
    if config.pool.interval_ms == 0 {
        errors.push(ValidationError::ZeroInterval);
    }

    match Url::parse(&config.discovery.api_server) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        _ => errors.push(ValidationError::InvalidApiServer(config.discovery.api_server.clone())),
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
