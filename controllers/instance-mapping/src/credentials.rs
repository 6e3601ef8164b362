//! Inventory credentials from Kubernetes Secrets
//!
//! The Secret referenced by `spec.credentialsSecretRef` carries:
//! - `baseurl`: inventory host
//! - `uaa`: JSON `{"url": ..., "clientid": ..., "clientsecret": ...}`

use crate::error::ControllerError;
use inventory_client::{Binding, UaaCredentials};
use k8s_openapi::ByteString;
use k8s_openapi::api::core::v1::Secret;
use kube::{Api, Client};
use std::collections::BTreeMap;

/// Secret key holding the inventory base URL
pub const BASE_URL_KEY: &str = "baseurl";
/// Secret key holding the authorization server credentials as JSON
pub const UAA_KEY: &str = "uaa";

#[async_trait::async_trait]
pub trait CredentialSource: Send + Sync {
    /// Read the inventory binding from the named Secret
    async fn binding(&self, namespace: &str, name: &str) -> Result<Binding, ControllerError>;
}

/// [`CredentialSource`] reading Secrets through the Kubernetes API
#[derive(Clone)]
pub struct SecretCredentialSource {
    client: Client,
}

impl SecretCredentialSource {
    /// Read credential Secrets through `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl CredentialSource for SecretCredentialSource {
    async fn binding(&self, namespace: &str, name: &str) -> Result<Binding, ControllerError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        let secret = api.get_opt(name).await?.ok_or_else(|| {
            ControllerError::Credentials(format!("secret {}/{} not found", namespace, name))
        })?;
        let empty = BTreeMap::new();
        binding_from_secret_data(secret.data.as_ref().unwrap_or(&empty))
            .map_err(|e| ControllerError::Credentials(format!("secret {}/{}: {}", namespace, name, e)))
    }
}

/// Decode a [`Binding`] from Secret data
pub(crate) fn binding_from_secret_data(data: &BTreeMap<String, ByteString>) -> Result<Binding, String> {
    let base_url = data
        .get(BASE_URL_KEY)
        .map(|v| String::from_utf8_lossy(&v.0).trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| format!("missing key {:?}", BASE_URL_KEY))?;

    let uaa_raw = data
        .get(UAA_KEY)
        .ok_or_else(|| format!("missing key {:?}", UAA_KEY))?;
    let uaa: UaaCredentials = serde_json::from_slice(&uaa_raw.0)
        .map_err(|e| format!("key {:?} is not valid JSON: {}", UAA_KEY, e))?;

    Ok(Binding { base_url, uaa })
}
