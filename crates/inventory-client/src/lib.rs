//! Inventory REST API Client
//!
//! Client for the instance-mapping endpoints of the service inventory:
//! `/inventory/v2/serviceInstances/{id}/instanceMappings`.
//!
//! # Example
//!
//! ```no_run
//! use inventory_client::{Binding, InventoryClient, InventoryClientTrait, Mapping, UaaCredentials};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let binding = Binding {
//!     base_url: "inventory.example.com".to_string(),
//!     uaa: UaaCredentials {
//!         url: "https://auth.example.com".to_string(),
//!         client_id: "client".to_string(),
//!         client_secret: "secret".to_string(),
//!     },
//! };
//! let client = InventoryClient::new(binding)?;
//!
//! client.create_mapping("svc-1", &Mapping::kubernetes("cluster-42", "ns-a")).await?;
//! let mappings = client.list_mappings("svc-1").await?;
//! # Ok(())
//! # }
//! ```
//!
//! Every call performs its own client-credentials token exchange; nothing is
//! cached between calls and nothing is retried.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod inventory_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::InventoryClient;
pub use error::InventoryError;
pub use inventory_trait::InventoryClientTrait;
pub use models::*;
#[cfg(feature = "test-util")]
pub use mock::{MockCall, MockInventoryClient};
