//! Test utilities for unit testing the reconciler
//!
//! In-memory stand-ins for the Kubernetes API plus helpers for building
//! InstanceMapping resources.

use crate::cluster_identity::ClusterIdentitySource;
use crate::config::ClusterConfigDefaults;
use crate::credentials::CredentialSource;
use crate::error::ControllerError;
use crate::reconciler::{InventoryClientFactory, ReconcileOutcome, Reconciler};
use crate::store::{MappingStore, object_key};
use crds::*;
use inventory_client::{Binding, InventoryClientTrait, InventoryError, MockInventoryClient, UaaCredentials};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const NAMESPACE: &str = "ns-a";
pub const NAME: &str = "test-mapping";
pub const CLUSTER_ID: &str = "cluster-42";
pub const SERVICE_INSTANCE_ID: &str = "svc-1";

/// Helper to create a test InstanceMapping as a user would submit it
pub fn create_test_mapping(
    namespace: &str,
    name: &str,
    service_instance_id: &str,
    target_namespace: Option<&str>,
) -> InstanceMapping {
    InstanceMapping {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            generation: Some(1),
            ..Default::default()
        },
        spec: InstanceMappingSpec {
            cluster_config_map_ref: ConfigMapReference::default(),
            credentials_secret_ref: SecretReference {
                name: "inventory-access".to_string(),
                namespace: None,
            },
            mapping: MappingSpec {
                service_instance_id: service_instance_id.to_string(),
                target_namespace: target_namespace.map(str::to_string),
            },
        },
        status: None,
    }
}

/// Set `deletionTimestamp`, as the API server does on delete when finalizers are present
pub fn mark_deleted(mapping: &mut InstanceMapping) {
    let timestamp: Time = serde_json::from_value(serde_json::json!("2026-01-01T00:00:00Z")).unwrap();
    mapping.metadata.deletion_timestamp = Some(timestamp);
}

fn conflict(what: &str) -> ControllerError {
    ControllerError::Kube(kube::Error::Service(
        format!("409 Conflict: stale resourceVersion on {}", what).into(),
    ))
}

#[derive(Default)]
struct StoreState {
    objects: HashMap<(String, String), InstanceMapping>,
    next_version: u64,
    spec_writes: usize,
    status_writes: usize,
    fail_status_writes: bool,
}

impl StoreState {
    fn bump(&mut self, mapping: &mut InstanceMapping) {
        self.next_version += 1;
        mapping.metadata.resource_version = Some(self.next_version.to_string());
    }
}

/// In-memory [`MappingStore`] with API-server write semantics:
/// - writes must carry the current resourceVersion
/// - `update` ignores status, `update_status` ignores everything else
/// - a deleting resource is purged once its last finalizer is removed
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
}

impl FakeStore {
    pub fn insert(&self, mut mapping: InstanceMapping) {
        let mut state = self.state.lock().unwrap();
        state.bump(&mut mapping);
        let key = object_key(&mapping).unwrap();
        state.objects.insert(key, mapping);
    }

    /// Current persisted copy
    pub fn stored(&self, namespace: &str, name: &str) -> Option<InstanceMapping> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Apply a user edit to the persisted copy
    pub fn edit(&self, namespace: &str, name: &str, f: impl FnOnce(&mut InstanceMapping)) {
        let mut state = self.state.lock().unwrap();
        let key = (namespace.to_string(), name.to_string());
        let mut mapping = state.objects.get(&key).cloned().unwrap();
        f(&mut mapping);
        state.bump(&mut mapping);
        state.objects.insert(key, mapping);
    }

    pub fn set_fail_status_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_status_writes = fail;
    }

    pub fn spec_writes(&self) -> usize {
        self.state.lock().unwrap().spec_writes
    }

    pub fn status_writes(&self) -> usize {
        self.state.lock().unwrap().status_writes
    }
}

#[async_trait::async_trait]
impl MappingStore for FakeStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<InstanceMapping>, ControllerError> {
        Ok(self.stored(namespace, name))
    }

    async fn update(&self, mapping: &InstanceMapping) -> Result<InstanceMapping, ControllerError> {
        let key = object_key(mapping)?;
        let mut state = self.state.lock().unwrap();
        let Some(current) = state.objects.get(&key).cloned() else {
            return Err(ControllerError::Kube(kube::Error::Service("404 Not Found".into())));
        };
        if current.metadata.resource_version != mapping.metadata.resource_version {
            return Err(conflict("update"));
        }

        let mut updated = mapping.clone();
        updated.status = current.status;
        state.bump(&mut updated);
        state.spec_writes += 1;

        let purge = updated.is_being_deleted()
            && updated.metadata.finalizers.as_ref().is_none_or(Vec::is_empty);
        if purge {
            state.objects.remove(&key);
        } else {
            state.objects.insert(key, updated.clone());
        }
        Ok(updated)
    }

    async fn update_status(&self, mapping: &InstanceMapping) -> Result<InstanceMapping, ControllerError> {
        let key = object_key(mapping)?;
        let mut state = self.state.lock().unwrap();
        if state.fail_status_writes {
            return Err(ControllerError::Kube(kube::Error::Service(
                "status subresource unavailable".into(),
            )));
        }
        let Some(mut current) = state.objects.get(&key).cloned() else {
            return Err(ControllerError::Kube(kube::Error::Service("404 Not Found".into())));
        };
        if current.metadata.resource_version != mapping.metadata.resource_version {
            return Err(conflict("status update"));
        }

        current.status = mapping.status.clone();
        state.bump(&mut current);
        state.status_writes += 1;
        state.objects.insert(key, current.clone());
        Ok(current)
    }
}

/// [`CredentialSource`] returning a fixed binding
pub struct StaticCredentials {
    binding: Binding,
    fail: Mutex<bool>,
    requests: Mutex<Vec<(String, String)>>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self {
            binding: Binding {
                base_url: "inventory.example.com".to_string(),
                uaa: UaaCredentials {
                    url: "https://auth.example.com".to_string(),
                    client_id: "client-id".to_string(),
                    client_secret: "client-secret".to_string(),
                },
            },
            fail: Mutex::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_fail(&self, fail: bool) {
        *self.fail.lock().unwrap() = fail;
    }

    /// `(namespace, name)` of every Secret read
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CredentialSource for StaticCredentials {
    async fn binding(&self, namespace: &str, name: &str) -> Result<Binding, ControllerError> {
        self.requests
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string()));
        if *self.fail.lock().unwrap() {
            return Err(ControllerError::Credentials(format!(
                "secret {}/{} not found",
                namespace, name
            )));
        }
        Ok(self.binding.clone())
    }
}

/// [`ClusterIdentitySource`] returning a configurable cluster ID
pub struct StaticClusterIdentity {
    cluster_id: Mutex<Option<String>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl StaticClusterIdentity {
    pub fn new(cluster_id: &str) -> Self {
        Self {
            cluster_id: Mutex::new(Some(cluster_id.to_string())),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `None` makes lookups fail as if the ConfigMap were missing
    pub fn set_cluster_id(&self, cluster_id: Option<&str>) {
        *self.cluster_id.lock().unwrap() = cluster_id.map(str::to_string);
    }

    /// `(namespace, name)` of every ConfigMap read
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ClusterIdentitySource for StaticClusterIdentity {
    async fn cluster_id(&self, namespace: &str, name: &str) -> Result<String, ControllerError> {
        self.requests
            .lock()
            .unwrap()
            .push((namespace.to_string(), name.to_string()));
        self.cluster_id.lock().unwrap().clone().ok_or_else(|| {
            ControllerError::ClusterIdentity(format!("configmap {}/{} not found", namespace, name))
        })
    }
}

/// Factory handing out clones of one shared mock inventory
pub fn mock_factory(inventory: &MockInventoryClient) -> InventoryClientFactory {
    let inventory = inventory.clone();
    Arc::new(
        move |_binding: Binding| -> Result<Box<dyn InventoryClientTrait>, InventoryError> {
            Ok(Box::new(inventory.clone()))
        },
    )
}

/// Reconciler wired to in-memory collaborators
pub struct TestHarness {
    pub store: Arc<FakeStore>,
    pub credentials: Arc<StaticCredentials>,
    pub cluster_identity: Arc<StaticClusterIdentity>,
    pub inventory: MockInventoryClient,
    pub reconciler: Reconciler,
}

impl TestHarness {
    pub fn new() -> Self {
        let store = Arc::new(FakeStore::default());
        let credentials = Arc::new(StaticCredentials::new());
        let cluster_identity = Arc::new(StaticClusterIdentity::new(CLUSTER_ID));
        let inventory = MockInventoryClient::new("https://inventory.example.com");
        let reconciler = Reconciler::new(
            store.clone(),
            credentials.clone(),
            cluster_identity.clone(),
            mock_factory(&inventory),
            ClusterConfigDefaults::default(),
        );
        Self {
            store,
            credentials,
            cluster_identity,
            inventory,
            reconciler,
        }
    }

    /// Harness holding one resource targeting `target_namespace`
    pub fn with_mapping(target_namespace: Option<&str>) -> Self {
        let harness = Self::new();
        harness
            .store
            .insert(create_test_mapping(NAMESPACE, NAME, SERVICE_INSTANCE_ID, target_namespace));
        harness
    }

    pub async fn reconcile(&self) -> Result<ReconcileOutcome, ControllerError> {
        self.reconciler.reconcile(NAMESPACE, NAME).await
    }

    pub fn stored(&self) -> Option<InstanceMapping> {
        self.store.stored(NAMESPACE, NAME)
    }

    /// Request deletion of the resource, as `kubectl delete` would
    pub fn delete(&self) {
        self.store.edit(NAMESPACE, NAME, mark_deleted);
    }
}
