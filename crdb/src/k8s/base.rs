use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::tunnel::RemoteConnector;

/// Errors emitted by the Kubernetes integration.
#[derive(Debug, Error)]
pub enum K8sError {
    /// The kubeconfig file could not be read or turned into a client config.
    #[error("An error occurred while loading the kubeconfig: {0}")]
    Kubeconfig(#[from] kube::config::KubeconfigError),
    /// An error returned by the [`kube`] client when talking to the API server.
    #[error("An error occurred with kube when dealing with K8s: {0}")]
    Kube(#[from] kube::Error),
    #[error("Service {namespace}/{service} has no pod selector")]
    ServiceWithoutSelector { namespace: String, service: String },
    #[error("No running pod backs service {namespace}/{service}")]
    NoRunningPod { namespace: String, service: String },
}

/// A simplified view of a pod phase.
///
/// Unknown values map to [`PodPhase::Unknown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

impl From<&str> for PodPhase {
    fn from(value: &str) -> Self {
        match value {
            "Pending" => PodPhase::Pending,
            "Running" => PodPhase::Running,
            "Succeeded" => PodPhase::Succeeded,
            "Failed" => PodPhase::Failed,
            _ => PodPhase::Unknown,
        }
    }
}

/// A pod selected as the target of a port-forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for PodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Kubernetes operations needed to open a tunnel to CockroachDB.
#[async_trait]
pub trait K8sClient: Send + Sync {
    /// Picks a running pod selected by the service `service_name` in `namespace`.
    async fn get_service_pod(&self, namespace: &str, service_name: &str)
    -> Result<PodRef, K8sError>;

    /// Returns a connector opening streams to `remote_port` on `pod`.
    fn pod_connector(&self, pod: &PodRef, remote_port: u16) -> Arc<dyn RemoteConnector>;
}
