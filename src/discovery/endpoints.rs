//! Endpoint lookup against the cluster API server.
//!
//! # Responsibilities
//! - Fetch the endpoints object of a service
//! - Authenticate with the mounted service account token
//! - Flatten subsets into targets
//!
//! # Design Decisions
//! - Token is re-read on every call so rotated tokens are picked up
//! - Each address is paired with the first port of its subset; multi-port
//!   services are not distinguished
//! - A subset without ports is skipped rather than failing the whole lookup

use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use url::Url;

use crate::config::DiscoveryConfig;
use crate::discovery::{credentials, DiscoveryError, Refresher, Selector};
use crate::load_balancer::target::{Target, TargetKey};

/// Endpoints object, reduced to the fields used for routing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointsResponse {
    pub subsets: Vec<Subset>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Subset {
    pub addresses: Vec<EndpointAddress>,
    pub ports: Vec<EndpointPort>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointAddress {
    pub ip: String,
    #[serde(rename = "targetRef")]
    pub target_ref: Option<TargetRef>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TargetRef {
    pub name: String,
    pub uid: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EndpointPort {
    pub name: Option<String>,
    pub port: u16,
}

impl EndpointsResponse {
    /// Flatten every address of every subset into a target.
    pub fn into_targets(self) -> Vec<Target> {
        let mut targets = Vec::new();

        for subset in self.subsets {
            let Some(port) = subset.ports.first().map(|p| p.port) else {
                if !subset.addresses.is_empty() {
                    tracing::warn!(addresses = subset.addresses.len(), "Skipping endpoint subset without ports");
                }
                continue;
            };

            for address in subset.addresses {
                let key = match address.target_ref {
                    Some(target_ref) => TargetKey::new(target_ref.name, target_ref.uid),
                    None => TargetKey::new(address.ip.clone(), String::new()),
                };
                targets.push(Target::new(key, address.ip, port));
            }
        }

        targets
    }
}

/// [`Refresher`] backed by the API server's endpoints resource.
#[derive(Debug, Clone)]
pub struct EndpointRefresher {
    client: reqwest::Client,
    api_server: Url,
    token_path: PathBuf,
}

impl EndpointRefresher {
    /// Build a refresher with a client trusting the configured CA bundle.
    pub fn new(config: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        let mut builder = reqwest::Client::builder()
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .connect_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(config.timeout_secs));

        if let Some(ca_path) = &config.ca_path {
            for root in credentials::load_root_certificates(ca_path)? {
                builder = builder.add_root_certificate(root);
            }
        }

        let client = builder.build()?;
        let api_server = Url::parse(&config.api_server)?;

        Ok(Self::with_client(client, api_server, config.token_path.clone()))
    }

    /// Build a refresher around an existing client.
    pub fn with_client(client: reqwest::Client, api_server: Url, token_path: PathBuf) -> Self {
        Self {
            client,
            api_server,
            token_path,
        }
    }

    /// URL of the endpoints object for `selector`.
    pub fn endpoints_url(&self, selector: &Selector) -> Result<Url, DiscoveryError> {
        let mut url = self.api_server.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .extend([
                "api",
                "v1",
                "namespaces",
                selector.namespace.as_str(),
                "endpoints",
                selector.service.as_str(),
            ]);
        Ok(url)
    }

    async fn fetch(&self, selector: &Selector) -> Result<Vec<Target>, DiscoveryError> {
        let url = self.endpoints_url(selector)?;
        let token = credentials::read_token(&self.token_path)?;

        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DiscoveryError::Status(status));
        }

        let body = response.bytes().await?;
        let endpoints: EndpointsResponse = serde_json::from_slice(&body)?;
        Ok(endpoints.into_targets())
    }
}

impl Refresher for EndpointRefresher {
    fn list_endpoints<'a>(
        &'a self,
        selector: &'a Selector,
    ) -> BoxFuture<'a, Result<Vec<Target>, DiscoveryError>> {
        Box::pin(self.fetch(selector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDPOINTS: &str = r#"{
        "kind": "Endpoints",
        "metadata": { "name": "kube-balance", "namespace": "default", "uid": "abc" },
        "subsets": [
            {
                "addresses": [
                    { "ip": "10.0.0.1", "targetRef": { "kind": "Pod", "name": "one", "uid": "111" } },
                    { "ip": "10.0.0.2", "targetRef": { "kind": "Pod", "name": "two", "uid": "222" } }
                ],
                "ports": [ { "name": "http", "port": 3007 }, { "name": "admin", "port": 9000 } ]
            },
            {
                "addresses": [ { "ip": "10.0.1.1" } ],
                "ports": [ { "port": 8080 } ]
            },
            {
                "addresses": [ { "ip": "10.0.2.1", "targetRef": { "name": "lost", "uid": "999" } } ]
            }
        ]
    }"#;

    #[test]
    fn test_flatten_subsets() {
        let response: EndpointsResponse = serde_json::from_str(ENDPOINTS).unwrap();
        let targets = response.into_targets();

        assert_eq!(targets.len(), 3);
        assert_eq!(targets[0], Target::new(TargetKey::new("one", "111"), "10.0.0.1", 3007));
        assert_eq!(targets[1], Target::new(TargetKey::new("two", "222"), "10.0.0.2", 3007));
        // Without a targetRef the address doubles as identity.
        assert_eq!(targets[2], Target::new(TargetKey::new("10.0.1.1", ""), "10.0.1.1", 8080));
    }

    #[test]
    fn test_empty_object() {
        let response: EndpointsResponse = serde_json::from_str("{}").unwrap();
        assert!(response.into_targets().is_empty());
    }

    #[test]
    fn test_endpoints_url() {
        let refresher = EndpointRefresher::with_client(
            reqwest::Client::new(),
            Url::parse("https://kubernetes.default.svc.cluster.local/").unwrap(),
            PathBuf::from("/tmp/token"),
        );
        let selector = Selector {
            namespace: "default".into(),
            service: "kube-balance".into(),
        };

        let url = refresher.endpoints_url(&selector).unwrap();
        assert_eq!(
            url.as_str(),
            "https://kubernetes.default.svc.cluster.local/api/v1/namespaces/default/endpoints/kube-balance"
        );
    }
}
