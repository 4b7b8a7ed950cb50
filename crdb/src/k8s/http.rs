use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::bail;
use crate::error::{CrdbResult, ErrorKind};
use crate::k8s::{K8sClient, K8sError, PodPhase, PodRef};
use crate::tunnel::{BoxedRemoteStream, RemoteConnector};

/// [`K8sClient`] backed by the Kubernetes API server.
#[derive(Clone)]
pub struct HttpK8sClient {
    client: Client,
}

impl HttpK8sClient {
    /// Builds a client from the kubeconfig file at `kube_config_path`.
    ///
    /// The file's current context selects the cluster and credentials.
    pub async fn new(kube_config_path: &Path) -> Result<HttpK8sClient, K8sError> {
        let kubeconfig = Kubeconfig::read_from(kube_config_path)?;
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?;
        let client = Client::try_from(config)?;

        Ok(HttpK8sClient { client })
    }
}

#[async_trait]
impl K8sClient for HttpK8sClient {
    async fn get_service_pod(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> Result<PodRef, K8sError> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let service = services.get(service_name).await?;

        let selector = service
            .spec
            .and_then(|spec| spec.selector)
            .filter(|selector| !selector.is_empty())
            .ok_or_else(|| K8sError::ServiceWithoutSelector {
                namespace: namespace.to_owned(),
                service: service_name.to_owned(),
            })?;

        let label_selector = label_selector(&selector);
        debug!(%label_selector, "listing pods behind service");

        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pods = pods.list(&ListParams::default().labels(&label_selector)).await?;

        pods.items
            .into_iter()
            .find(|pod| {
                let phase = pod
                    .status
                    .as_ref()
                    .and_then(|status| status.phase.as_deref())
                    .unwrap_or("Unknown");
                PodPhase::from(phase) == PodPhase::Running
            })
            .and_then(|pod| pod.metadata.name)
            .map(|name| PodRef {
                namespace: namespace.to_owned(),
                name,
            })
            .ok_or_else(|| K8sError::NoRunningPod {
                namespace: namespace.to_owned(),
                service: service_name.to_owned(),
            })
    }

    fn pod_connector(&self, pod: &PodRef, remote_port: u16) -> Arc<dyn RemoteConnector> {
        Arc::new(PodConnector {
            pods: Api::namespaced(self.client.clone(), &pod.namespace),
            pod_name: pod.name.clone(),
            remote_port,
        })
    }
}

fn label_selector(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Opens one API server port-forward stream per accepted connection.
struct PodConnector {
    pods: Api<Pod>,
    pod_name: String,
    remote_port: u16,
}

#[async_trait]
impl RemoteConnector for PodConnector {
    async fn connect(&self) -> CrdbResult<BoxedRemoteStream> {
        let mut forwarder = match self
            .pods
            .portforward(&self.pod_name, &[self.remote_port])
            .await
        {
            Ok(forwarder) => forwarder,
            Err(err) => bail!(
                ErrorKind::RemoteUnreachableError,
                "Failed to open a port-forward to the pod",
                format!("{}:{}: {err}", self.pod_name, self.remote_port)
            ),
        };

        let Some(stream) = forwarder.take_stream(self.remote_port) else {
            bail!(
                ErrorKind::RemoteUnreachableError,
                "Port-forward returned no stream for the remote port",
                format!("{}:{}", self.pod_name, self.remote_port)
            );
        };

        let pod_name = self.pod_name.clone();
        tokio::spawn(async move {
            if let Err(err) = forwarder.join().await {
                warn!(pod = %pod_name, error = %err, "port-forward ended with an error");
            }
        });

        Ok(Box::new(stream))
    }
}
