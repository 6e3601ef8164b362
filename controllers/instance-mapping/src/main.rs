//! InstanceMapping Controller
//!
//! Keeps the service inventory's instance mappings in sync with
//! InstanceMapping CRs:
//! - creates the inventory record for a CR's service instance and namespace
//! - re-keys the record when the target namespace or cluster changes
//! - removes the record before the CR is allowed to go away (finalizer)

mod backoff;
mod cluster_identity;
mod config;
mod controller;
mod credentials;
mod error;
mod reconciler;
mod store;
#[cfg(test)]
mod test_utils;
mod watcher;

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use controller::Controller;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // kube and reqwest both link rustls; pin the process-wide crypto provider
    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("rustls crypto provider already installed");
    }

    info!("Starting InstanceMapping Controller");

    let config = ControllerConfig::from_env()?;

    info!("Configuration:");
    info!(
        "  Namespace: {}",
        config.watch_namespace.as_deref().unwrap_or("all namespaces")
    );
    info!(
        "  Cluster ConfigMap default: {}/{}",
        config.cluster_config_defaults.namespace, config.cluster_config_defaults.name
    );
    info!("  Concurrency: {}", config.concurrency);
    info!("  Debounce: {}s", config.debounce.as_secs());

    let controller = Controller::new(config).await?;
    controller.run().await?;

    info!("InstanceMapping Controller stopped");
    Ok(())
}
