//! Targets document model and address resolution.
//!
//! A targets document is either a plain address list or Kubernetes
//! `Endpoints` data (a single object or an `EndpointsList`). Endpoints data
//! is resolved against the configured service name, port name and optional
//! namespace into `ip:port` addresses.

use serde::{Deserialize, Serialize};

use crate::config::DiscoverySettings;
use crate::registry::TargetAddress;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TargetsDocument {
    Addresses(Vec<TargetAddress>),
    TargetList(TargetList),
    EndpointsList(EndpointsList),
    Endpoints(Endpoints),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TargetList {
    pub targets: Vec<TargetAddress>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointsList {
    pub items: Vec<Endpoints>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Endpoints {
    pub metadata: ObjectMeta,

    #[serde(default)]
    pub subsets: Vec<EndpointSubset>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct EndpointSubset {
    #[serde(default)]
    pub addresses: Vec<EndpointAddress>,

    #[serde(default)]
    pub ports: Vec<EndpointPort>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointAddress {
    pub ip: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointPort {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub port: i32,
}

impl TargetsDocument {
    /// Addresses this document yields for `settings`.
    ///
    /// Plain lists are returned verbatim; endpoints objects are filtered
    /// by service name (and namespace, when both sides carry one).
    #[must_use]
    pub fn resolve(self, settings: &DiscoverySettings) -> Vec<TargetAddress> {
        match self {
            Self::Addresses(targets) | Self::TargetList(TargetList { targets }) => targets,
            Self::EndpointsList(list) => list
                .items
                .iter()
                .flat_map(|endpoints| endpoints.matching_addresses(settings))
                .collect(),
            Self::Endpoints(endpoints) => endpoints.matching_addresses(settings),
        }
    }
}

impl Endpoints {
    fn matches(&self, settings: &DiscoverySettings) -> bool {
        if self.metadata.name != settings.service {
            tracing::debug!(name = %self.metadata.name, "skipping non matching service");
            return false;
        }
        match (&settings.namespace, &self.metadata.namespace) {
            (Some(wanted), Some(actual)) if wanted != actual => {
                tracing::debug!(
                    name = %self.metadata.name,
                    namespace = %actual,
                    "skipping service from another namespace"
                );
                false
            }
            _ => true,
        }
    }

    /// `ip:port` for every address of every subset, using the subset's port
    /// named `settings.port_name`. A subset without that port still yields
    /// its addresses, with port 0, so the failure shows up in attempts.
    #[must_use]
    pub fn matching_addresses(&self, settings: &DiscoverySettings) -> Vec<TargetAddress> {
        if !self.matches(settings) {
            return Vec::new();
        }

        let mut addresses = Vec::new();
        for subset in &self.subsets {
            let port = subset
                .ports
                .iter()
                .rev()
                .find(|p| p.name.as_deref().unwrap_or("") == settings.port_name)
                .map(|p| p.port);
            let port = port.unwrap_or_else(|| {
                tracing::error!(
                    port_name = %settings.port_name,
                    service = %self.metadata.name,
                    "did not find specified port name in the service"
                );
                0
            });
            addresses.extend(
                subset
                    .addresses
                    .iter()
                    .map(|address| format!("{}:{port}", address.ip)),
            );
        }
        addresses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(namespace: Option<&str>) -> DiscoverySettings {
        DiscoverySettings {
            service: "cache".into(),
            port_name: "http".into(),
            namespace: namespace.map(String::from),
        }
    }

    const ENDPOINTS_LIST: &str = r#"{
        "kind": "EndpointsList",
        "items": [
            {
                "metadata": {"name": "cache", "namespace": "prod"},
                "subsets": [
                    {
                        "addresses": [{"ip": "10.0.0.1"}, {"ip": "10.0.0.2"}],
                        "ports": [{"name": "metrics", "port": 9100}, {"name": "http", "port": 8080}]
                    },
                    {
                        "addresses": [{"ip": "10.0.1.1"}],
                        "ports": [{"name": "http", "port": 8081}]
                    }
                ]
            },
            {
                "metadata": {"name": "cache", "namespace": "staging"},
                "subsets": [{"addresses": [{"ip": "10.9.0.1"}], "ports": [{"name": "http", "port": 80}]}]
            },
            {
                "metadata": {"name": "other", "namespace": "prod"},
                "subsets": [{"addresses": [{"ip": "10.5.0.1"}], "ports": [{"name": "http", "port": 80}]}]
            }
        ]
    }"#;

    #[test]
    fn plain_list_is_verbatim() {
        let doc: TargetsDocument = serde_json::from_str(r#"["a:1", "a:1", "b:2"]"#).unwrap();
        assert_eq!(doc.resolve(&settings(None)), vec!["a:1", "a:1", "b:2"]);
    }

    #[test]
    fn target_list_object() {
        let doc: TargetsDocument = serde_json::from_str(r#"{"targets": ["a:1"]}"#).unwrap();
        assert_eq!(doc.resolve(&settings(None)), vec!["a:1"]);
    }

    #[test]
    fn endpoints_list_filters_by_service_and_namespace() {
        let doc: TargetsDocument = serde_json::from_str(ENDPOINTS_LIST).unwrap();
        assert_eq!(
            doc.resolve(&settings(Some("prod"))),
            vec!["10.0.0.1:8080", "10.0.0.2:8080", "10.0.1.1:8081"]
        );
    }

    #[test]
    fn no_namespace_filter_watches_everything() {
        let doc: TargetsDocument = serde_json::from_str(ENDPOINTS_LIST).unwrap();
        assert_eq!(doc.resolve(&settings(None)).len(), 4);
    }

    #[test]
    fn single_endpoints_object() {
        let doc: TargetsDocument = serde_json::from_str(
            r#"{"metadata": {"name": "cache"}, "subsets": [{"addresses": [{"ip": "1.2.3.4"}], "ports": [{"name": "http", "port": 80}]}]}"#,
        )
        .unwrap();
        assert_eq!(doc.resolve(&settings(Some("prod"))), vec!["1.2.3.4:80"]);
    }

    #[test]
    fn missing_port_name_yields_port_zero() {
        let doc: TargetsDocument = serde_json::from_str(
            r#"{"metadata": {"name": "cache"}, "subsets": [{"addresses": [{"ip": "1.2.3.4"}], "ports": [{"name": "grpc", "port": 9090}]}]}"#,
        )
        .unwrap();
        assert_eq!(doc.resolve(&settings(None)), vec!["1.2.3.4:0"]);
    }

    #[test]
    fn endpoints_without_subsets_is_empty() {
        let doc: TargetsDocument =
            serde_json::from_str(r#"{"metadata": {"name": "cache"}}"#).unwrap();
        assert!(doc.resolve(&settings(None)).is_empty());
    }
}
