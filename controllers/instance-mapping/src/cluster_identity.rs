//! Cluster identity lookup
//!
//! The cluster ID is the `primaryID` of every mapping the controller creates.
//! It is read from the `CLUSTER_ID` key of a ConfigMap.

use crate::error::ControllerError;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use std::collections::BTreeMap;

/// ConfigMap key holding the cluster identifier
pub const CLUSTER_ID_KEY: &str = "CLUSTER_ID";

#[async_trait::async_trait]
pub trait ClusterIdentitySource: Send + Sync {
    /// Cluster ID stored in the named ConfigMap
    async fn cluster_id(&self, namespace: &str, name: &str) -> Result<String, ControllerError>;
}

/// [`ClusterIdentitySource`] reading ConfigMaps through the Kubernetes API
#[derive(Clone)]
pub struct ConfigMapClusterIdentity {
    client: Client,
}

impl ConfigMapClusterIdentity {
    /// Read cluster ConfigMaps through `client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ClusterIdentitySource for ConfigMapClusterIdentity {
    async fn cluster_id(&self, namespace: &str, name: &str) -> Result<String, ControllerError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        let config_map = api.get_opt(name).await?.ok_or_else(|| {
            ControllerError::ClusterIdentity(format!("configmap {}/{} not found", namespace, name))
        })?;
        cluster_id_from_data(config_map.data.as_ref()).ok_or_else(|| {
            ControllerError::ClusterIdentity(format!(
                "configmap {}/{} has no {} value",
                namespace, name, CLUSTER_ID_KEY
            ))
        })
    }
}

/// Non-empty `CLUSTER_ID` from ConfigMap data
pub(crate) fn cluster_id_from_data(data: Option<&BTreeMap<String, String>>) -> Option<String> {
    data?
        .get(CLUSTER_ID_KEY)
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_id_from_data() {
        let data = BTreeMap::from([(CLUSTER_ID_KEY.to_string(), " cluster-42 ".to_string())]);
        assert_eq!(cluster_id_from_data(Some(&data)).as_deref(), Some("cluster-42"));
    }

    #[test]
    fn test_missing_or_empty_cluster_id() {
        assert_eq!(cluster_id_from_data(None), None);

        let empty = BTreeMap::from([(CLUSTER_ID_KEY.to_string(), String::new())]);
        assert_eq!(cluster_id_from_data(Some(&empty)), None);

        let other = BTreeMap::from([("REGION".to_string(), "eu".to_string())]);
        assert_eq!(cluster_id_from_data(Some(&other)), None);
    }
}
