//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Queue depth used when `max_waiting` is zero.
pub const DEFAULT_MAX_WAITING: usize = 1024;

/// Root configuration for the balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BalancerConfig {
    /// Dispatch pool settings.
    pub pool: PoolConfig,

    /// Discovery backend settings.
    pub discovery: DiscoveryConfig,

    /// Outbound HTTP client settings.
    pub transport: TransportConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Identifies the logical backend group.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Selector {
    /// Namespace of the service.
    pub namespace: String,

    /// Service name.
    pub service: String,
}

/// Dispatch pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Service whose endpoints are balanced over.
    pub selector: Selector,

    /// Discovery interval in milliseconds.
    pub interval_ms: u64,

    /// Maximum callers waiting for a target (0 = default of 1024).
    pub max_waiting: usize,
}

impl PoolConfig {
    /// Discovery interval, never shorter than one millisecond.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    /// Queue depth actually used.
    pub fn effective_max_waiting(&self) -> usize {
        if self.max_waiting == 0 {
            DEFAULT_MAX_WAITING
        } else {
            self.max_waiting
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            selector: Selector::default(),
            interval_ms: 5000,
            max_waiting: DEFAULT_MAX_WAITING,
        }
    }
}

/// Cluster API server discovery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Base URL of the API server.
    pub api_server: String,

    /// Path to the service account bearer token.
    pub token_path: PathBuf,

    /// Path to the CA bundle used to verify the API server.
    /// When unset the system roots are used.
    pub ca_path: Option<PathBuf>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            api_server: "https://kubernetes.default.svc.cluster.local".to_string(),
            token_path: PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/token"),
            ca_path: Some(PathBuf::from("/var/run/secrets/kubernetes.io/serviceaccount/ca.crt")),
            timeout_secs: 10,
        }
    }
}

/// Outbound transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// TCP keep-alive interval in seconds.
    pub keepalive_secs: u64,

    /// Idle pooled connection timeout in seconds.
    pub idle_timeout_secs: u64,

    /// Maximum idle pooled connections per backend.
    pub max_idle_per_host: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            keepalive_secs: 30,
            idle_timeout_secs: 90,
            max_idle_per_host: 100,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BalancerConfig::default();
        assert_eq!(config.pool.interval(), Duration::from_secs(5));
        assert_eq!(config.pool.effective_max_waiting(), 1024);
        assert_eq!(config.transport.idle_timeout_secs, 90);
        assert!(config.discovery.ca_path.is_some());
    }

    #[test]
    fn test_zero_max_waiting_uses_default() {
        let config = PoolConfig {
            max_waiting: 0,
            ..PoolConfig::default()
        };
        assert_eq!(config.effective_max_waiting(), DEFAULT_MAX_WAITING);
    }

    #[test]
    fn test_partial_toml() {
        let config: BalancerConfig = toml::from_str(
            r#"
            [pool]
            interval_ms = 250
            selector = { namespace = "default", service = "kube-balance" }
            "#,
        )
        .unwrap();
        assert_eq!(config.pool.selector.service, "kube-balance");
        assert_eq!(config.pool.interval(), Duration::from_millis(250));
        assert_eq!(config.pool.max_waiting, 1024);
        assert_eq!(config.observability.log_level, "info");
    }
}
