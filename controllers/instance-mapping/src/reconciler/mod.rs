//! Reconciliation logic for InstanceMapping CRs.
//!
//! One call to [`Reconciler::reconcile`] moves a single resource one step
//! closer to its desired state:
//!
//! 1. fetch (gone means already cleaned up)
//! 2. deletion: remove the inventory record, then the finalizer
//! 3. attach the finalizer
//! 4. write an initial `InProgress` condition
//! 5. default `targetNamespace` to the resource's namespace and requeue
//! 6. sync the inventory record and report `Succeeded` or `Failed`
//!
//! Invocations for the same resource are serialized by the watch loop.

pub mod sync;


use crate::cluster_identity::ClusterIdentitySource;
use crate::config::ClusterConfigDefaults;
use crate::credentials::CredentialSource;
use crate::error::ControllerError;
use crate::store::MappingStore;
use crds::{Condition, InstanceMapping, MappingId, ReadyReason, set_condition};
use inventory_client::{Binding, InventoryClientTrait, InventoryError};
use std::sync::Arc;
use tracing::{debug, info};

/// Builds an inventory client for one reconciliation
pub type InventoryClientFactory =
    Arc<dyn Fn(Binding) -> Result<Box<dyn InventoryClientTrait>, InventoryError> + Send + Sync>;

/// What the watch loop should do after a successful reconcile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Converged; wait for the next change
    Done,
    /// Spec was defaulted; run again with the persisted value
    Requeue,
}

/// Reconciles InstanceMapping resources against the inventory.
pub struct Reconciler {
    pub(crate) store: Arc<dyn MappingStore>,
    pub(crate) credentials: Arc<dyn CredentialSource>,
    pub(crate) cluster_identity: Arc<dyn ClusterIdentitySource>,
    pub(crate) inventory_client_factory: InventoryClientFactory,
    pub(crate) cluster_config_defaults: ClusterConfigDefaults,
}

impl Reconciler {
    /// Wire a reconciler from its collaborators
    pub fn new(
        store: Arc<dyn MappingStore>,
        credentials: Arc<dyn CredentialSource>,
        cluster_identity: Arc<dyn ClusterIdentitySource>,
        inventory_client_factory: InventoryClientFactory,
        cluster_config_defaults: ClusterConfigDefaults,
    ) -> Self {
        Self {
            store,
            credentials,
            cluster_identity,
            inventory_client_factory,
            cluster_config_defaults,
        }
    }

    /// Reconcile the InstanceMapping `namespace/name`.
    ///
    /// Every failure after the resource was fetched is first written to the
    /// Ready condition. If that status write fails, its error is returned
    /// instead of the original one.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome, ControllerError> {
        let Some(mut mapping) = self.store.get(namespace, name).await? else {
            debug!("InstanceMapping {}/{} not found, nothing to do", namespace, name);
            return Ok(ReconcileOutcome::Done);
        };
        debug!(
            "Got InstanceMapping {}/{} generation {:?}",
            namespace, name, mapping.metadata.generation
        );

        if mapping.is_being_deleted() {
            return self.finalize(mapping).await;
        }

        if mapping.add_finalizer() {
            mapping = self.store.update(&mapping).await?;
            info!("Added finalizer to InstanceMapping {}/{}", namespace, name);
        }

        if mapping.has_no_conditions() {
            self.write_ready(&mut mapping, ReadyReason::InProgress, String::new(), None)
                .await?;
            info!("Initialized status of InstanceMapping {}/{}", namespace, name);
        }

        if mapping.spec.mapping.target_namespace().is_none() {
            mapping.spec.mapping.target_namespace = Some(namespace.to_string());
            self.store.update(&mapping).await?;
            info!(
                "Defaulted targetNamespace of InstanceMapping {}/{} to {}",
                namespace, name, namespace
            );
            return Ok(ReconcileOutcome::Requeue);
        }

        match self.sync_mapping(&mapping).await {
            Ok(mapping_id) => {
                info!("Synced mapping {} for InstanceMapping {}/{}", mapping_id, namespace, name);
                self.write_ready(&mut mapping, ReadyReason::Succeeded, String::new(), Some(mapping_id))
                    .await?;
                Ok(ReconcileOutcome::Done)
            }
            Err(e) => {
                self.write_ready(&mut mapping, ReadyReason::Failed, e.to_string(), None)
                    .await?;
                Err(e)
            }
        }
    }

    /// Deletion branch: the finalizer only goes once the inventory record is gone
    async fn finalize(&self, mut mapping: InstanceMapping) -> Result<ReconcileOutcome, ControllerError> {
        if !mapping.has_finalizer() {
            return Ok(ReconcileOutcome::Done);
        }

        if let Err(e) = self.delete_mapping(&mapping).await {
            self.write_ready(&mut mapping, ReadyReason::Failed, e.to_string(), None)
                .await?;
            return Err(e);
        }
        info!("Deleted mapping for InstanceMapping {:?}", mapping.metadata.name);

        mapping.remove_finalizer();
        self.store.update(&mapping).await?;
        info!("Removed finalizer from InstanceMapping {:?}", mapping.metadata.name);
        Ok(ReconcileOutcome::Done)
    }

    /// Set the Ready condition (and the observed mapping ID, if given) and
    /// persist it. Skips the write when nothing changed.
    async fn write_ready(
        &self,
        mapping: &mut InstanceMapping,
        reason: ReadyReason,
        message: String,
        mapping_id: Option<MappingId>,
    ) -> Result<(), ControllerError> {
        let generation = mapping.metadata.generation;
        let status = mapping.status.get_or_insert_with(Default::default);

        let mut changed = set_condition(&mut status.conditions, Condition::ready(reason, message, generation));
        if let Some(mapping_id) = mapping_id {
            if status.mapping_id.as_ref() != Some(&mapping_id) {
                status.mapping_id = Some(mapping_id);
                changed = true;
            }
        }

        if !changed {
            debug!("Status of InstanceMapping {:?} unchanged, skipping update", mapping.metadata.name);
            return Ok(());
        }

        *mapping = self.store.update_status(mapping).await?;
        Ok(())
    }
}
