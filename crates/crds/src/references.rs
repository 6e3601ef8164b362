//! Kubernetes object references for InstanceMapping
//!
//! Points at the Secret holding inventory credentials and the ConfigMap holding
//! the cluster identity. Both follow the Kubernetes `name` + optional `namespace`
//! reference shape.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference to the Secret holding inventory API credentials
///
/// The Secret must contain:
/// - `baseurl`: inventory API host (e.g. "inventory.example.com")
/// - `uaa`: JSON document `{"url": ..., "clientid": ..., "clientsecret": ...}`
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Name of the Secret
    pub name: String,

    /// Namespace of the Secret (defaults to the namespace of the InstanceMapping)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl SecretReference {
    /// Create a reference to a Secret in the given namespace
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }

    /// Namespace of the Secret, falling back to `default_namespace` when unset or empty
    pub fn namespace_or<'a>(&'a self, default_namespace: &'a str) -> &'a str {
        non_empty(self.namespace.as_deref()).unwrap_or(default_namespace)
    }
}

/// Reference to the ConfigMap holding the cluster identity (`CLUSTER_ID` key)
///
/// Both fields are optional; the controller substitutes its configured defaults
/// for whichever is missing.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ConfigMapReference {
    /// Namespace of the ConfigMap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Name of the ConfigMap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ConfigMapReference {
    /// Create a fully specified reference
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: Some(name.into()),
        }
    }

    /// Resolve to `(namespace, name)`, substituting defaults for unset or empty fields
    pub fn resolve<'a>(&'a self, default_namespace: &'a str, default_name: &'a str) -> (&'a str, &'a str) {
        (
            non_empty(self.namespace.as_deref()).unwrap_or(default_namespace),
            non_empty(self.name.as_deref()).unwrap_or(default_name),
        )
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
