use std::sync::Arc;
use tracing::{debug, info, warn};

use crdb_config::shared::{KubeConfig, ProviderConfig};

use crate::client::PgClient;
use crate::endpoint::ConnectionEndpoint;
use crate::error::{CrdbResult, ErrorKind};
use crate::guard::{InvocationGuard, TunnelConfig};
use crate::k8s::{HttpK8sClient, K8sClient};

/// Provider state built once from [`ProviderConfig`] and shared by every resource.
pub struct Provider {
    endpoint: ConnectionEndpoint,
    kube_config: Option<KubeConfig>,
    guard: InvocationGuard,
}

impl Provider {
    /// Validates `config` and, in tunnel mode, builds the Kubernetes client
    /// from the configured kubeconfig file.
    pub async fn new(config: &ProviderConfig) -> CrdbResult<Provider> {
        config.validate()?;

        let k8s_client = match &config.kube_config {
            Some(kube_config) => {
                let path = kube_config.expanded_kube_config_path()?;
                info!(path = %path.display(), "loading kubeconfig");

                let client = HttpK8sClient::new(&path).await?;
                Some(Arc::new(client) as Arc<dyn K8sClient>)
            }
            None => None,
        };

        Provider::with_k8s_client(config, k8s_client)
    }

    /// Builds a provider around an existing Kubernetes client.
    pub fn with_k8s_client(
        config: &ProviderConfig,
        k8s_client: Option<Arc<dyn K8sClient>>,
    ) -> CrdbResult<Provider> {
        config.validate()?;

        Ok(Provider {
            endpoint: ConnectionEndpoint::from_config(config)?,
            kube_config: config.kube_config.clone(),
            guard: InvocationGuard::new(k8s_client, config.tunnel_ready_timeout()),
        })
    }

    pub fn tunnel_config(&self, local_port: &str) -> TunnelConfig {
        TunnelConfig {
            kube_config: self.kube_config.clone(),
            local_port: local_port.to_owned(),
        }
    }

    /// Runs `op` against a fresh database session reached through `local_port`.
    ///
    /// The tunnel, if any, is acquired first and closed after the session is
    /// dropped, whatever `op` returns. If the session failed because the
    /// tunnel died underneath it, the tunnel's error is returned instead.
    pub async fn run<T, F>(&self, local_port: &str, op: F) -> CrdbResult<T>
    where
        F: AsyncFnOnce(&PgClient) -> CrdbResult<T>,
    {
        let tunnel = self
            .guard
            .acquire_tunnel(&self.tunnel_config(local_port))
            .await?;

        let result = self.connect_and_run(local_port, op).await;

        let Some(tunnel) = tunnel else {
            return result;
        };

        match (tunnel.close().await, result) {
            (Ok(()), result) => result,
            (Err(tunnel_err), Ok(value)) => {
                warn!(error = %tunnel_err, "tunnel failed after the operation completed");
                Ok(value)
            }
            (Err(tunnel_err), Err(err)) if err.kind() == ErrorKind::DatabaseConnectionFailed => {
                debug!(error = %err, "database session failed because of the tunnel");
                Err(tunnel_err)
            }
            (Err(tunnel_err), Err(err)) => {
                debug!(error = %tunnel_err, "tunnel also failed");
                Err(err)
            }
        }
    }

    async fn connect_and_run<T, F>(&self, local_port: &str, op: F) -> CrdbResult<T>
    where
        F: AsyncFnOnce(&PgClient) -> CrdbResult<T>,
    {
        let client = PgClient::connect(&self.endpoint.resolve(local_port)).await?;
        op(&client).await
    }
}
