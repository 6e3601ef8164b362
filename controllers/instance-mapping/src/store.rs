//! Persistence of InstanceMapping resources
//!
//! The reconciler only talks to [`MappingStore`], so its state machine can be
//! exercised against an in-memory store. Every write carries the object's
//! `resourceVersion`; a stale copy fails with a 409 conflict and the
//! reconcile is retried from a fresh read.

use crate::error::ControllerError;
use crds::InstanceMapping;
use kube::api::{Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};

#[async_trait::async_trait]
pub trait MappingStore: Send + Sync {
    /// Fetch a resource; `None` once it has been purged
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<InstanceMapping>, ControllerError>;

    /// Persist metadata and spec (finalizers, defaulted target namespace)
    async fn update(&self, mapping: &InstanceMapping) -> Result<InstanceMapping, ControllerError>;

    /// Persist the status subresource
    async fn update_status(&self, mapping: &InstanceMapping) -> Result<InstanceMapping, ControllerError>;
}

/// [`MappingStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeMappingStore {
    client: Client,
}

impl KubeMappingStore {
    /// Store backed by the API server reachable through `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<InstanceMapping> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// `(namespace, name)` of a persisted resource
pub(crate) fn object_key(mapping: &InstanceMapping) -> Result<(String, String), ControllerError> {
    let namespace = mapping
        .namespace()
        .ok_or_else(|| ControllerError::InvalidResource("InstanceMapping has no namespace".to_string()))?;
    let name = mapping
        .metadata
        .name
        .clone()
        .ok_or_else(|| ControllerError::InvalidResource("InstanceMapping has no name".to_string()))?;
    Ok((namespace, name))
}

#[async_trait::async_trait]
impl MappingStore for KubeMappingStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<InstanceMapping>, ControllerError> {
        Ok(self.api(namespace).get_opt(name).await?)
    }

    async fn update(&self, mapping: &InstanceMapping) -> Result<InstanceMapping, ControllerError> {
        let (namespace, name) = object_key(mapping)?;
        Ok(self
            .api(&namespace)
            .replace(&name, &PostParams::default(), mapping)
            .await?)
    }

    async fn update_status(&self, mapping: &InstanceMapping) -> Result<InstanceMapping, ControllerError> {
        let (namespace, name) = object_key(mapping)?;
        // resourceVersion turns the merge patch into a conditional write
        let patch = serde_json::json!({
            "metadata": {
                "resourceVersion": mapping.metadata.resource_version,
            },
            "status": mapping.status,
        });
        Ok(self
            .api(&namespace)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?)
    }
}
