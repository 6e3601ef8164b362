//! Main controller implementation.
//!
//! Wires the reconciler to the Kubernetes API and the inventory HTTP client,
//! then runs the InstanceMapping watcher in a background task.

use crate::cluster_identity::ConfigMapClusterIdentity;
use crate::config::ControllerConfig;
use crate::credentials::SecretCredentialSource;
use crate::error::ControllerError;
use crate::reconciler::{InventoryClientFactory, Reconciler};
use crate::store::KubeMappingStore;
use crate::watcher::{WatchContext, watch_instance_mappings};
use crds::InstanceMapping;
use inventory_client::client::REQUEST_TIMEOUT;
use inventory_client::{Binding, InventoryClient, InventoryClientTrait, InventoryError};
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for InstanceMapping resources.
pub struct Controller {
    watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts watching.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing InstanceMapping Controller");

        let kube_client = Client::try_default().await?;

        // One connection pool; each reconcile still gets its own client value and token
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ControllerError::inventory("building HTTP client", InventoryError::from(e)))?;
        let inventory_client_factory: InventoryClientFactory = Arc::new(
            move |binding: Binding| -> Result<Box<dyn InventoryClientTrait>, InventoryError> {
                let client = InventoryClient::with_http_client(http_client.clone(), binding)?;
                Ok(Box::new(client))
            },
        );

        let reconciler = Reconciler::new(
            Arc::new(KubeMappingStore::new(kube_client.clone())),
            Arc::new(SecretCredentialSource::new(kube_client.clone())),
            Arc::new(ConfigMapClusterIdentity::new(kube_client.clone())),
            inventory_client_factory,
            config.cluster_config_defaults.clone(),
        );

        let api: Api<InstanceMapping> = match config.watch_namespace.as_deref() {
            Some(namespace) => Api::namespaced(kube_client, namespace),
            None => Api::all(kube_client),
        };
        let ctx = Arc::new(WatchContext::new(Arc::new(reconciler)));

        let concurrency = config.concurrency;
        let debounce = config.debounce;
        let watcher = tokio::spawn(async move {
            watch_instance_mappings(api, ctx, concurrency, debounce).await
        });

        Ok(Self { watcher })
    }

    /// Runs until the watcher stops (SIGINT/SIGTERM).
    pub async fn run(self) -> Result<(), ControllerError> {
        match self.watcher.await {
            Ok(result) => result,
            Err(e) => Err(ControllerError::Watch(format!("watcher task failed: {}", e))),
        }
    }
}
