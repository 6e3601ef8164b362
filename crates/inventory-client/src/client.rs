//! Inventory API client
//!
//! Implements the instance-mapping endpoints:
//! `GET|POST|DELETE /inventory/v2/serviceInstances/{id}/instanceMappings`.

use crate::auth::fetch_access_token;
use crate::error::InventoryError;
use crate::inventory_trait::InventoryClientTrait;
use crate::models::*;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

/// Maximum number of response body bytes read from the inventory
pub const RESPONSE_BODY_LIMIT: usize = 64 * 1024;

/// Per-request timeout (token exchange and inventory calls alike)
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Inventory API client
///
/// Built from a [`Binding`] for the duration of one reconciliation and
/// dropped afterwards; holds no tokens.
pub struct InventoryClient {
    client: Client,
    base_url: String,
    uaa: UaaCredentials,
}

impl InventoryClient {
    /// Create a new inventory client
    ///
    /// # Arguments
    /// * `binding` - inventory host and client credentials
    pub fn new(binding: Binding) -> Result<Self, InventoryError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Self::with_http_client(client, binding)
    }

    /// Create a client reusing an existing reqwest connection pool
    pub fn with_http_client(client: Client, binding: Binding) -> Result<Self, InventoryError> {
        Ok(Self {
            client,
            base_url: normalize_base_url(&binding.base_url)?,
            uaa: binding.uaa,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn mappings_url(&self, service_instance_id: &str) -> Result<String, InventoryError> {
        if service_instance_id.is_empty() {
            return Err(InventoryError::InvalidRequest(
                "service instance ID is empty".to_string(),
            ));
        }
        Ok(format!(
            "{}/inventory/v2/serviceInstances/{}/instanceMappings",
            self.base_url,
            urlencoding::encode(service_instance_id)
        ))
    }

    /// Attach a freshly exchanged bearer token and send the request
    async fn send_authenticated(&self, request: RequestBuilder) -> Result<Response, InventoryError> {
        let token = fetch_access_token(&self.client, &self.uaa).await?;
        let response = request
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;
        Ok(response)
    }
}

#[async_trait::async_trait]
impl InventoryClientTrait for InventoryClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list_mappings(&self, service_instance_id: &str) -> Result<Vec<Mapping>, InventoryError> {
        let url = self.mappings_url(service_instance_id)?;
        debug!("Listing mappings for service instance {}", service_instance_id);

        let response = self.send_authenticated(self.client.get(&url)).await?;

        if response.status() != StatusCode::OK {
            return Err(InventoryError::UnexpectedStatus {
                operation: "list mappings",
                status: response.status().as_u16(),
            });
        }

        let body = read_limited_body(response, RESPONSE_BODY_LIMIT).await?;
        let list: MappingList = serde_json::from_slice(&body)?;
        Ok(list.mappings)
    }

    async fn create_mapping(&self, service_instance_id: &str, mapping: &Mapping) -> Result<(), InventoryError> {
        let url = self.mappings_url(service_instance_id)?;
        debug!(
            "Creating mapping {}/{} for service instance {}",
            mapping.primary_id, mapping.secondary_id, service_instance_id
        );

        let body = serde_json::to_vec(mapping)?;
        let request = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body);
        let response = self.send_authenticated(request).await?;

        match response.status() {
            StatusCode::CREATED => Ok(()),
            StatusCode::OK => Err(InventoryError::MappingAlreadyExists),
            status => Err(InventoryError::UnexpectedStatus {
                operation: "create mapping",
                status: status.as_u16(),
            }),
        }
    }

    async fn delete_mapping(
        &self,
        service_instance_id: &str,
        primary_id: &str,
        secondary_id: &str,
    ) -> Result<(), InventoryError> {
        let url = self.mappings_url(service_instance_id)?;
        debug!(
            "Deleting mapping {}/{} for service instance {}",
            primary_id, secondary_id, service_instance_id
        );

        let request = self
            .client
            .delete(&url)
            .query(&[("primaryID", primary_id), ("secondaryID", secondary_id)]);
        let response = self.send_authenticated(request).await?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => Err(InventoryError::MappingNotFound),
            status => Err(InventoryError::UnexpectedStatus {
                operation: "delete mapping",
                status: status.as_u16(),
            }),
        }
    }
}

/// Prefix `https://` when the Secret only carries a host name
pub(crate) fn normalize_base_url(base_url: &str) -> Result<String, InventoryError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(InventoryError::InvalidRequest(
            "inventory base URL is empty".to_string(),
        ));
    }
    if trimmed.contains("://") {
        Ok(trimmed.to_string())
    } else {
        Ok(format!("https://{}", trimmed))
    }
}

/// Read a response body, failing once more than `limit` bytes arrive
pub(crate) async fn read_limited_body(mut response: Response, limit: usize) -> Result<Vec<u8>, InventoryError> {
    if response.content_length().is_some_and(|len| len > limit as u64) {
        return Err(InventoryError::ResponseTooLarge { limit });
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        if body.len() + chunk.len() > limit {
            return Err(InventoryError::ResponseTooLarge { limit });
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
