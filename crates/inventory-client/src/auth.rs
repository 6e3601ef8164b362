//! OAuth2 client-credentials token exchange
//!
//! Each inventory call fetches a fresh bearer token; tokens are never cached.

use crate::client::{RESPONSE_BODY_LIMIT, read_limited_body};
use crate::error::InventoryError;
use crate::models::UaaCredentials;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

/// Token endpoint path relative to the authorization server URL
pub const TOKEN_PATH: &str = "/oauth/token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
}

/// Exchange client credentials for a bearer token
///
/// Sends `grant_type=client_credentials` with the client ID and secret as
/// HTTP basic auth.
///
/// # Errors
/// * `InventoryError::InvalidRequest` - no authorization server URL configured
/// * `InventoryError::Http` - the token endpoint is unreachable
/// * `InventoryError::Authentication` - non-2xx answer or no token in the body
/// * `InventoryError::ResponseTooLarge` - token response larger than `RESPONSE_BODY_LIMIT`
pub async fn fetch_access_token(client: &Client, uaa: &UaaCredentials) -> Result<String, InventoryError> {
    if uaa.url.is_empty() {
        return Err(InventoryError::InvalidRequest(
            "authorization server URL is empty".to_string(),
        ));
    }

    let url = format!("{}{}", uaa.url.trim_end_matches('/'), TOKEN_PATH);
    debug!("Requesting client-credentials token from {}", url);

    let response = client
        .post(&url)
        .basic_auth(&uaa.client_id, Some(&uaa.client_secret))
        .header("Accept", "application/json")
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = read_limited_body(response, RESPONSE_BODY_LIMIT)
            .await
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default();
        return Err(InventoryError::Authentication(format!(
            "token endpoint returned {} - {}",
            status, body
        )));
    }

    let body = read_limited_body(response, RESPONSE_BODY_LIMIT).await?;
    let token: TokenResponse = serde_json::from_slice(&body)
        .map_err(|e| InventoryError::Authentication(format!("invalid token response: {}", e)))?;

    if token.access_token.is_empty() {
        return Err(InventoryError::Authentication(
            "token response did not contain an access_token".to_string(),
        ));
    }

    Ok(token.access_token)
}
