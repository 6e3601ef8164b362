//! Controller configuration
//!
//! Read once at startup from environment variables.

use crate::error::ControllerError;
use std::time::Duration;

/// Built-in location of the ConfigMap carrying `CLUSTER_ID`
pub const DEFAULT_CLUSTER_CONFIGMAP_NAMESPACE: &str = "kyma-system";
/// Built-in name of the ConfigMap carrying `CLUSTER_ID`
pub const DEFAULT_CLUSTER_CONFIGMAP_NAME: &str = "sap-btp-operator-config";

const DEFAULT_CONCURRENCY: u16 = 3;
const DEFAULT_DEBOUNCE_SECONDS: u64 = 1;

/// Fallback ConfigMap location for resources that leave `clusterConfigMapRef` unset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfigDefaults {
    pub namespace: String,
    pub name: String,
}

impl Default for ClusterConfigDefaults {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_CLUSTER_CONFIGMAP_NAMESPACE.to_string(),
            name: DEFAULT_CLUSTER_CONFIGMAP_NAME.to_string(),
        }
    }
}

/// Runtime settings of the controller process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Namespace to watch; `None` watches all namespaces
    pub watch_namespace: Option<String>,
    /// ConfigMap used when a resource does not name one
    pub cluster_config_defaults: ClusterConfigDefaults,
    /// Maximum concurrent reconciliations
    pub concurrency: u16,
    /// Quiet period after the last event before a reconcile starts
    pub debounce: Duration,
}

impl ControllerConfig {
    /// Load configuration from the process environment
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `WATCH_NAMESPACE` | all namespaces |
    /// | `CLUSTER_CONFIGMAP_NAMESPACE` | `kyma-system` |
    /// | `CLUSTER_CONFIGMAP_NAME` | `sap-btp-operator-config` |
    /// | `RECONCILE_CONCURRENCY` | 3 |
    /// | `RECONCILE_DEBOUNCE_SECONDS` | 1 |
    pub fn from_env() -> Result<Self, ControllerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ControllerConfig::from_env`] with an injectable variable source
    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ControllerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let defaults = ClusterConfigDefaults::default();
        let cluster_config_defaults = ClusterConfigDefaults {
            namespace: var("CLUSTER_CONFIGMAP_NAMESPACE").unwrap_or(defaults.namespace),
            name: var("CLUSTER_CONFIGMAP_NAME").unwrap_or(defaults.name),
        };

        let concurrency = match var("RECONCILE_CONCURRENCY") {
            Some(raw) => parse_number::<u16>("RECONCILE_CONCURRENCY", &raw)?,
            None => DEFAULT_CONCURRENCY,
        };
        if concurrency == 0 {
            return Err(ControllerError::InvalidConfig(
                "RECONCILE_CONCURRENCY must be at least 1".to_string(),
            ));
        }

        let debounce_seconds = match var("RECONCILE_DEBOUNCE_SECONDS") {
            Some(raw) => parse_number::<u64>("RECONCILE_DEBOUNCE_SECONDS", &raw)?,
            None => DEFAULT_DEBOUNCE_SECONDS,
        };

        Ok(Self {
            watch_namespace: var("WATCH_NAMESPACE"),
            cluster_config_defaults,
            concurrency,
            debounce: Duration::from_secs(debounce_seconds),
        })
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, ControllerError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| {
        ControllerError::InvalidConfig(format!("{} must be a non-negative integer, got {:?}: {}", key, raw, e))
    })
}
