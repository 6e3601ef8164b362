//! InventoryClient trait for mocking
//!
//! This trait abstracts the InventoryClient so the reconciler can be tested
//! against an in-memory implementation.

use crate::error::InventoryError;
use crate::models::Mapping;

/// Trait for inventory API client operations
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait InventoryClientTrait: Send + Sync {
    /// Get the base URL
    fn base_url(&self) -> &str;

    /// List the mappings registered for a service instance.
    ///
    /// Not used for reconciliation decisions; exposed for inspection.
    async fn list_mappings(&self, service_instance_id: &str) -> Result<Vec<Mapping>, InventoryError>;

    /// Register a mapping.
    ///
    /// Returns `InventoryError::MappingAlreadyExists` when the inventory
    /// already holds a record with the same key.
    async fn create_mapping(&self, service_instance_id: &str, mapping: &Mapping) -> Result<(), InventoryError>;

    /// Remove the mapping identified by `primary_id`/`secondary_id`.
    ///
    /// Returns `InventoryError::MappingNotFound` when no such record exists.
    async fn delete_mapping(
        &self,
        service_instance_id: &str,
        primary_id: &str,
        secondary_id: &str,
    ) -> Result<(), InventoryError>;
}
