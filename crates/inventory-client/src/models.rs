//! Inventory API data models

use serde::{Deserialize, Serialize};

/// Platform reported for every mapping created by the controller
pub const PLATFORM_KUBERNETES: &str = "kubernetes";

/// Instance mapping record as stored by the inventory
///
/// Keyed by the service instance ID (path) plus `primaryID`/`secondaryID`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Mapping {
    pub platform: String,

    /// Platform-specific primary key (cluster ID for Kubernetes)
    #[serde(rename = "primaryID")]
    pub primary_id: String,

    /// Platform-specific secondary key (namespace for Kubernetes)
    #[serde(rename = "secondaryID")]
    pub secondary_id: String,

    #[serde(rename = "isDefault", default, skip_serializing_if = "std::ops::Not::not")]
    pub is_default: bool,
}

impl Mapping {
    /// Mapping of a service instance to a Kubernetes namespace
    pub fn kubernetes(cluster_id: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            platform: PLATFORM_KUBERNETES.to_string(),
            primary_id: cluster_id.into(),
            secondary_id: namespace.into(),
            is_default: false,
        }
    }

    /// Whether this record has the given compound key
    pub fn matches(&self, primary_id: &str, secondary_id: &str) -> bool {
        self.primary_id == primary_id && self.secondary_id == secondary_id
    }
}

/// Body of a list response
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MappingList {
    #[serde(default)]
    pub mappings: Vec<Mapping>,
}

/// Credentials needed to reach the inventory, as stored in the access Secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    /// Inventory host, with or without scheme (`https` assumed when absent)
    pub base_url: String,
    pub uaa: UaaCredentials,
}

/// OAuth2 client-credentials parameters (the Secret's `uaa` JSON document)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct UaaCredentials {
    /// Authorization server base URL; the token endpoint is `{url}/oauth/token`
    #[serde(default)]
    pub url: String,

    #[serde(rename = "clientid", default)]
    pub client_id: String,

    #[serde(rename = "clientsecret", default)]
    pub client_secret: String,
}
