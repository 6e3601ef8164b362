//! Inventory side of reconciliation: creating, re-keying and deleting the
//! mapping record.
//!
//! The observed mapping ID in status is the only record of what exists in
//! the inventory; the inventory itself is never listed here.

use super::Reconciler;
use crate::error::ControllerError;
use crate::store::object_key;
use crds::{InstanceMapping, MappingId};
use inventory_client::{InventoryClientTrait, Mapping};
use tracing::{debug, info};

/// How to get from the observed mapping ID to the desired one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPlan {
    /// Nothing recorded yet
    Create,
    /// Recorded identity equals the desired one; recreate it
    Overwrite,
    /// Identity changed; delete `previous` before creating the new record
    Migrate { previous: MappingId },
}

impl SyncPlan {
    /// Choose the plan for moving from `observed` to `desired`
    pub fn for_transition(observed: Option<&MappingId>, desired: &MappingId) -> Self {
        match observed {
            None => SyncPlan::Create,
            Some(observed) if observed == desired => SyncPlan::Overwrite,
            Some(observed) => SyncPlan::Migrate {
                previous: observed.clone(),
            },
        }
    }

    /// An existing record is only expected when recreating our own identity
    pub fn tolerates_already_exists(&self) -> bool {
        matches!(self, SyncPlan::Overwrite)
    }
}

impl Reconciler {
    /// Make the inventory hold the desired mapping. Returns its identity.
    pub(crate) async fn sync_mapping(&self, mapping: &InstanceMapping) -> Result<MappingId, ControllerError> {
        let (namespace, _) = object_key(mapping)?;
        let target_namespace = mapping
            .spec
            .mapping
            .target_namespace()
            .ok_or_else(|| ControllerError::InvalidResource("targetNamespace is not set".to_string()))?;

        let cluster_id = self.resolve_cluster_id(mapping).await?;
        let desired = MappingId::new(
            mapping.spec.mapping.service_instance_id.clone(),
            cluster_id,
            target_namespace,
        );
        let plan = SyncPlan::for_transition(mapping.observed_mapping_id(), &desired);
        debug!("Sync plan for {}: {:?}", desired, plan);

        let client = self.inventory_client(mapping, &namespace).await?;

        if let SyncPlan::Migrate { previous } = &plan {
            delete_record(client.as_ref(), previous).await?;
            info!("Deleted previous mapping {}", previous);
        }

        let record = Mapping::kubernetes(desired.primary_id.clone(), desired.secondary_id.clone());
        match client.create_mapping(&desired.service_instance_id, &record).await {
            Ok(()) => {}
            Err(e) if e.is_already_exists() && plan.tolerates_already_exists() => {
                debug!("Mapping {} already exists", desired);
            }
            Err(e) => return Err(ControllerError::inventory(format!("creating mapping {}", desired), e)),
        }

        Ok(desired)
    }

    /// Remove the observed mapping from the inventory, if one was recorded
    pub(crate) async fn delete_mapping(&self, mapping: &InstanceMapping) -> Result<(), ControllerError> {
        let Some(mapping_id) = mapping.observed_mapping_id() else {
            debug!("No mapping recorded for {:?}, nothing to delete", mapping.metadata.name);
            return Ok(());
        };

        let (namespace, _) = object_key(mapping)?;
        let client = self.inventory_client(mapping, &namespace).await?;
        delete_record(client.as_ref(), mapping_id).await
    }

    async fn resolve_cluster_id(&self, mapping: &InstanceMapping) -> Result<String, ControllerError> {
        let (cm_namespace, cm_name) = mapping.spec.cluster_config_map_ref.resolve(
            &self.cluster_config_defaults.namespace,
            &self.cluster_config_defaults.name,
        );
        self.cluster_identity.cluster_id(cm_namespace, cm_name).await
    }

    /// Fresh inventory client built from the resource's credentials Secret
    async fn inventory_client(
        &self,
        mapping: &InstanceMapping,
        namespace: &str,
    ) -> Result<Box<dyn InventoryClientTrait>, ControllerError> {
        let secret_ref = &mapping.spec.credentials_secret_ref;
        let binding = self
            .credentials
            .binding(secret_ref.namespace_or(namespace), &secret_ref.name)
            .await?;
        (self.inventory_client_factory)(binding)
            .map_err(|e| ControllerError::inventory("building inventory client", e))
    }
}

/// Delete one record; an already missing record counts as deleted
async fn delete_record(client: &dyn InventoryClientTrait, mapping_id: &MappingId) -> Result<(), ControllerError> {
    match client
        .delete_mapping(
            &mapping_id.service_instance_id,
            &mapping_id.primary_id,
            &mapping_id.secondary_id,
        )
        .await
    {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            debug!("Mapping {} already gone", mapping_id);
            Ok(())
        }
        Err(e) => Err(ControllerError::inventory(format!("deleting mapping {}", mapping_id), e)),
    }
}
