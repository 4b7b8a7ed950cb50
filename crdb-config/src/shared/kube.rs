use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::shared::{ValidationError, parse_port};

/// Default location of the kubeconfig file.
pub const DEFAULT_KUBE_CONFIG_PATH: &str = "~/.kube/config";

/// Default CockroachDB SQL port exposed by the service.
pub const DEFAULT_REMOTE_PORT: &str = "26257";

/// Settings for reaching CockroachDB through a Kubernetes port-forward.
///
/// When this block is present every resource operation opens a tunnel from a
/// local port to [`KubeConfig::remote_port`] on a pod behind
/// [`KubeConfig::service_name`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct KubeConfig {
    /// Path to the kubeconfig file. A leading `~` is expanded to the home directory.
    #[serde(default = "default_kube_config_path")]
    pub kube_config_path: String,
    /// Namespace in which the CockroachDB service runs.
    #[serde(default)]
    pub namespace: String,
    /// Name of the CockroachDB service.
    #[serde(default)]
    pub service_name: String,
    /// Port of the pod to forward to.
    #[serde(default = "default_remote_port")]
    pub remote_port: String,
}

fn default_kube_config_path() -> String {
    DEFAULT_KUBE_CONFIG_PATH.to_owned()
}

fn default_remote_port() -> String {
    DEFAULT_REMOTE_PORT.to_owned()
}

impl KubeConfig {
    /// Creates a config for `service_name` in `namespace` with default path and port.
    pub fn new(namespace: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            kube_config_path: default_kube_config_path(),
            namespace: namespace.into(),
            service_name: service_name.into(),
            remote_port: default_remote_port(),
        }
    }

    /// Checks namespace, service name and remote port.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.namespace.is_empty() {
            return Err(ValidationError::EmptyNamespace);
        }

        if self.service_name.is_empty() {
            return Err(ValidationError::EmptyServiceName);
        }

        parse_port("remote_port", &self.remote_port)?;

        Ok(())
    }

    /// Returns the kubeconfig path with a leading `~` replaced by the home directory.
    pub fn expanded_kube_config_path(&self) -> Result<PathBuf, ValidationError> {
        expand_home(&self.kube_config_path)
    }
}

/// Expands a leading `~` in `path` to the invoking user's home directory.
pub fn expand_home(path: &str) -> Result<PathBuf, ValidationError> {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(PathBuf::from(path)),
    };

    let home = dirs::home_dir().ok_or_else(|| ValidationError::HomeDirUnavailable(path.to_owned()))?;
    if rest.is_empty() {
        Ok(home)
    } else {
        Ok(home.join(rest))
    }
}
