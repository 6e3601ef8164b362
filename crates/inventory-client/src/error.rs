//! Inventory client errors

use thiserror::Error;

/// Errors that can occur when interacting with the inventory API
///
/// `MappingAlreadyExists` and `MappingNotFound` are domain signals rather than
/// failures: callers decide per call site whether they are expected.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// HTTP transport error (connection, TLS, timeout)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Token exchange failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Create answered 200: the mapping is already registered
    #[error("mapping already exists")]
    MappingAlreadyExists,

    /// Delete answered 404
    #[error("mapping not found")]
    MappingNotFound,

    /// Any other status code
    #[error("failed to {operation}, HTTP {status}")]
    UnexpectedStatus { operation: &'static str, status: u16 },

    /// Response body exceeded the read limit
    #[error("response body exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid request (e.g. malformed base URL)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl InventoryError {
    /// The record to create is already present
    pub fn is_already_exists(&self) -> bool {
        matches!(self, InventoryError::MappingAlreadyExists)
    }

    /// The record to delete is already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, InventoryError::MappingNotFound)
    }
}
