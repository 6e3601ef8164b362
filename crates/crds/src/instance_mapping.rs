//! InstanceMapping CRD
//!
//! Declares that a service instance should be mapped to a namespace of this
//! cluster in the external inventory.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::conditions::{find_condition, Condition, CONDITION_TYPE_READY};
use crate::references::{ConfigMapReference, SecretReference};

/// Finalizer guarding removal of the inventory record before the CR is purged
pub const FINALIZER_NAME: &str = "instancemappings.dcops.microscaler.io/finalizer";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "dcops.microscaler.io",
    version = "v1alpha1",
    kind = "InstanceMapping",
    namespaced,
    status = "InstanceMappingStatus",
    shortname = "imap",
    printcolumn = r#"{"name":"Service Instance ID", "type":"string", "jsonPath":".spec.mapping.serviceInstanceId"}"#,
    printcolumn = r#"{"name":"Target Namespace", "type":"string", "jsonPath":".spec.mapping.targetNamespace"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMappingSpec {
    /// ConfigMap carrying the cluster identity (controller defaults apply to unset fields)
    #[serde(default)]
    pub cluster_config_map_ref: ConfigMapReference,

    /// Secret carrying inventory API credentials
    pub credentials_secret_ref: SecretReference,

    /// Desired mapping
    pub mapping: MappingSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MappingSpec {
    /// Service instance to map
    pub service_instance_id: String,

    /// Namespace the instance is mapped to (defaults to the CR's own namespace)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_namespace: Option<String>,
}

impl MappingSpec {
    /// Target namespace, treating an empty string as unset
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMappingStatus {
    /// Observed conditions (at most one per type)
    #[serde(default)]
    pub conditions: Vec<Condition>,

    /// Identity of the inventory record last created by the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_id: Option<MappingId>,
}

/// Compound key of an inventory mapping record
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct MappingId {
    pub service_instance_id: String,

    /// Cluster (platform) identity
    pub primary_id: String,

    /// Resolved target namespace
    pub secondary_id: String,
}

impl MappingId {
    /// Identity from its three key parts
    pub fn new(
        service_instance_id: impl Into<String>,
        primary_id: impl Into<String>,
        secondary_id: impl Into<String>,
    ) -> Self {
        Self {
            service_instance_id: service_instance_id.into(),
            primary_id: primary_id.into(),
            secondary_id: secondary_id.into(),
        }
    }
}

impl fmt::Display for MappingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.service_instance_id, self.primary_id, self.secondary_id)
    }
}

impl InstanceMapping {
    /// Whether deletion has been requested (deletionTimestamp set)
    pub fn is_being_deleted(&self) -> bool {
        self.metadata.deletion_timestamp.is_some()
    }

    /// Whether the cleanup finalizer is attached
    pub fn has_finalizer(&self) -> bool {
        self.metadata
            .finalizers
            .as_ref()
            .is_some_and(|finalizers| finalizers.iter().any(|f| f == FINALIZER_NAME))
    }

    /// Adds the controller finalizer. Returns `false` if it was already present.
    pub fn add_finalizer(&mut self) -> bool {
        if self.has_finalizer() {
            return false;
        }
        self.metadata
            .finalizers
            .get_or_insert_with(Vec::new)
            .push(FINALIZER_NAME.to_string());
        true
    }

    /// Removes the controller finalizer. Returns `false` if it was not present.
    pub fn remove_finalizer(&mut self) -> bool {
        let Some(finalizers) = self.metadata.finalizers.as_mut() else {
            return false;
        };
        let before = finalizers.len();
        finalizers.retain(|f| f != FINALIZER_NAME);
        before != finalizers.len()
    }

    /// Mapping identity recorded in status, if any
    pub fn observed_mapping_id(&self) -> Option<&MappingId> {
        self.status.as_ref().and_then(|s| s.mapping_id.as_ref())
    }

    /// The `Ready` condition, if one was written
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.status
            .as_ref()
            .and_then(|s| find_condition(&s.conditions, CONDITION_TYPE_READY))
    }

    /// True until the first condition has been written
    pub fn has_no_conditions(&self) -> bool {
        self.status.as_ref().is_none_or(|s| s.conditions.is_empty())
    }
}
