//! Controller-specific error types.
//!
//! Each variant names the sub-step that failed. The `Display` text is what
//! ends up in the Ready condition's message.

use inventory_client::InventoryError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the InstanceMapping controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error (includes optimistic-concurrency conflicts)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Inventory call failed; `context` says which call
    #[error("{context}: {source}")]
    Inventory {
        context: String,
        #[source]
        source: InventoryError,
    },

    /// Credentials Secret missing or malformed
    #[error("Invalid inventory credentials: {0}")]
    Credentials(String),

    /// Cluster identity ConfigMap missing or without a cluster ID
    #[error("Cluster identity unavailable: {0}")]
    ClusterIdentity(String),

    /// Resource lacks metadata the controller relies on
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Wrap an inventory failure with the step that hit it
    pub fn inventory(context: impl Into<String>, source: InventoryError) -> Self {
        ControllerError::Inventory {
            context: context.into(),
            source,
        }
    }
}
