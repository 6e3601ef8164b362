//! Mock InventoryClient for unit testing
//!
//! Stores mappings in memory and mimics the inventory's status-code semantics:
//! creating an existing key yields `MappingAlreadyExists`, deleting a missing
//! key yields `MappingNotFound`. Failures can be injected per operation as an
//! HTTP status code. Clones share state, so a test can keep one handle while
//! the code under test receives another.

use crate::error::InventoryError;
use crate::inventory_trait::InventoryClientTrait;
use crate::models::Mapping;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// A call received by the mock, in order of arrival
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `list_mappings`
    List {
        service_instance_id: String,
    },
    /// `create_mapping` with the record sent
    Create {
        service_instance_id: String,
        mapping: Mapping,
    },
    /// `delete_mapping` with the compound key sent
    Delete {
        service_instance_id: String,
        primary_id: String,
        secondary_id: String,
    },
}

#[derive(Debug, Default)]
struct InjectedFailures {
    list: Option<u16>,
    create: Option<u16>,
    delete: Option<u16>,
}

/// Mock InventoryClient for testing
#[derive(Clone)]
pub struct MockInventoryClient {
    base_url: String,
    mappings: Arc<Mutex<HashMap<String, Vec<Mapping>>>>,
    failures: Arc<Mutex<InjectedFailures>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockInventoryClient {
    /// Create a new mock client
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            mappings: Arc::new(Mutex::new(HashMap::new())),
            failures: Arc::new(Mutex::new(InjectedFailures::default())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Add a mapping to the mock store (for test setup)
    pub fn add_mapping(&self, service_instance_id: &str, mapping: Mapping) {
        lock(&self.mappings)
            .entry(service_instance_id.to_string())
            .or_default()
            .push(mapping);
    }

    /// Mappings currently stored for a service instance
    pub fn mappings(&self, service_instance_id: &str) -> Vec<Mapping> {
        lock(&self.mappings)
            .get(service_instance_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Make list calls answer with the given HTTP status (None to clear)
    pub fn set_list_failure(&self, status: Option<u16>) {
        lock(&self.failures).list = status;
    }

    /// Make create calls answer with the given HTTP status (None to clear)
    pub fn set_create_failure(&self, status: Option<u16>) {
        lock(&self.failures).create = status;
    }

    /// Make delete calls answer with the given HTTP status (None to clear)
    pub fn set_delete_failure(&self, status: Option<u16>) {
        lock(&self.failures).delete = status;
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<MockCall> {
        lock(&self.calls).clone()
    }

    /// Forget the recorded calls
    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn record(&self, call: MockCall) {
        lock(&self.calls).push(call);
    }
}

#[async_trait::async_trait]
impl InventoryClientTrait for MockInventoryClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list_mappings(&self, service_instance_id: &str) -> Result<Vec<Mapping>, InventoryError> {
        self.record(MockCall::List {
            service_instance_id: service_instance_id.to_string(),
        });
        if let Some(status) = lock(&self.failures).list {
            return Err(InventoryError::UnexpectedStatus {
                operation: "list mappings",
                status,
            });
        }
        Ok(self.mappings(service_instance_id))
    }

    async fn create_mapping(&self, service_instance_id: &str, mapping: &Mapping) -> Result<(), InventoryError> {
        self.record(MockCall::Create {
            service_instance_id: service_instance_id.to_string(),
            mapping: mapping.clone(),
        });
        if let Some(status) = lock(&self.failures).create {
            return Err(InventoryError::UnexpectedStatus {
                operation: "create mapping",
                status,
            });
        }

        let mut mappings = lock(&self.mappings);
        let records = mappings.entry(service_instance_id.to_string()).or_default();
        if records
            .iter()
            .any(|m| m.matches(&mapping.primary_id, &mapping.secondary_id))
        {
            return Err(InventoryError::MappingAlreadyExists);
        }
        records.push(mapping.clone());
        Ok(())
    }

    async fn delete_mapping(
        &self,
        service_instance_id: &str,
        primary_id: &str,
        secondary_id: &str,
    ) -> Result<(), InventoryError> {
        self.record(MockCall::Delete {
            service_instance_id: service_instance_id.to_string(),
            primary_id: primary_id.to_string(),
            secondary_id: secondary_id.to_string(),
        });
        if let Some(status) = lock(&self.failures).delete {
            return Err(InventoryError::UnexpectedStatus {
                operation: "delete mapping",
                status,
            });
        }

        let mut mappings = lock(&self.mappings);
        let Some(records) = mappings.get_mut(service_instance_id) else {
            return Err(InventoryError::MappingNotFound);
        };
        let before = records.len();
        records.retain(|m| !m.matches(primary_id, secondary_id));
        if records.len() == before {
            return Err(InventoryError::MappingNotFound);
        }
        Ok(())
    }
}
