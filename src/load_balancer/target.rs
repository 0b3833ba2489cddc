//! Backend identity and address.
//!
//! # Responsibilities
//! - Identify a single backend instance independently of its address
//! - Carry the address a request should be forwarded to
//!
//! # Design Decisions
//! - Identity is (name, uid): an address can be reused by a different instance
//! - Targets are never mutated; every discovery cycle produces fresh values

use std::fmt;

/// Immutable identity of a backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetKey {
    /// Stable name of the instance (e.g. the pod name).
    pub name: String,
    /// Unique id of this incarnation of the instance.
    pub uid: String,
}

impl TargetKey {
    /// Create a new target key.
    pub fn new(name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uid: uid.into(),
        }
    }
}

impl fmt::Display for TargetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.uid)
    }
}

/// A single addressable backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Identity of the backend.
    pub key: TargetKey,
    /// Host (usually an IP) the backend listens on.
    pub host: String,
    /// Port the backend listens on.
    pub port: u16,
}

impl Target {
    /// Create a new target.
    pub fn new(key: TargetKey, host: impl Into<String>, port: u16) -> Self {
        Self {
            key,
            host: host.into(),
            port,
        }
    }

    /// `host:port`, with IPv6 hosts bracketed.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
