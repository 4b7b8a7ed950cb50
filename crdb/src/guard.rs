use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crdb_config::shared::{KubeConfig, parse_port};

use crate::bail;
use crate::crdb_error;
use crate::error::{CrdbResult, ErrorKind};
use crate::k8s::K8sClient;
use crate::tunnel::{PortForwardTunnel, TunnelHandle};

/// Tunnel settings for one resource operation.
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    /// Port-forward target. `None` means the database is reached directly.
    pub kube_config: Option<KubeConfig>,
    /// Local port the tunnel listens on, as configured on the resource.
    pub local_port: String,
}

/// Brings up a tunnel in front of each resource operation that needs one.
///
/// The guard is built once per provider and shared by every operation. It
/// holds the Kubernetes client, so no cluster state is kept between calls
/// apart from that client.
pub struct InvocationGuard {
    k8s_client: Option<Arc<dyn K8sClient>>,
    ready_timeout: Duration,
}

impl InvocationGuard {
    pub fn new(k8s_client: Option<Arc<dyn K8sClient>>, ready_timeout: Duration) -> Self {
        Self {
            k8s_client,
            ready_timeout,
        }
    }

    /// Opens a tunnel for `config` and waits until it accepts connections.
    ///
    /// Returns `Ok(None)` without touching the cluster when no kube config is
    /// set. On every error path the tunnel, if one was started, is closed
    /// before returning, so no listener outlives a failed acquisition.
    pub async fn acquire_tunnel(&self, config: &TunnelConfig) -> CrdbResult<Option<TunnelHandle>> {
        let Some(kube_config) = &config.kube_config else {
            debug!("no kube config set, connecting directly");
            return Ok(None);
        };

        kube_config.validate()?;
        let local_port = parse_port("local_port", &config.local_port)?;
        let remote_port = parse_port("remote_port", &kube_config.remote_port)?;

        let Some(k8s_client) = &self.k8s_client else {
            bail!(
                ErrorKind::ConfigurationError,
                "A kube config is set but no Kubernetes client was built"
            );
        };

        let pod = k8s_client
            .get_service_pod(&kube_config.namespace, &kube_config.service_name)
            .await
            .map_err(|err| {
                crdb_error!(
                    ErrorKind::RemoteUnreachableError,
                    "Failed to find a pod behind the CockroachDB service",
                    err
                )
            })?;
        debug!(%pod, remote_port, "resolved port-forward target");

        let connector = k8s_client.pod_connector(&pod, remote_port);
        let tunnel = TunnelHandle::start(PortForwardTunnel::new(local_port, connector));
        let tunnel = ready_or_close(tunnel, self.ready_timeout).await?;

        info!(%pod, local_port, remote_port, "tunnel is ready");

        Ok(Some(tunnel))
    }
}

/// Waits for `tunnel` to accept connections. On failure the tunnel is closed,
/// and its port released, before the error is returned.
async fn ready_or_close(mut tunnel: TunnelHandle, timeout: Duration) -> CrdbResult<TunnelHandle> {
    if let Err(err) = tunnel.wait_ready(timeout).await {
        warn!(error = %err, local_port = tunnel.local_port(), "tunnel failed to become ready");
        if let Err(close_err) = tunnel.close().await {
            debug!(error = %close_err, "tunnel also failed while closing");
        }
        return Err(err);
    }

    Ok(tunnel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concurrency::ready::create_ready_signal;
    use crate::concurrency::stop::create_stop_signal;
    use std::net::Ipv4Addr;
    use tokio::net::TcpListener;

    /// A tunnel that holds its port but never reports readiness.
    async fn bound_but_never_ready() -> TunnelHandle {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let local_port = listener.local_addr().unwrap().port();
        let (stop_tx, mut stop_rx) = create_stop_signal();
        let (ready_tx, ready_rx) = create_ready_signal();
        let task = tokio::spawn(async move {
            let _ready_tx = ready_tx;
            stop_rx.stopped().await;
            drop(listener);
            Ok(())
        });

        TunnelHandle::from_parts(local_port, stop_tx, ready_rx, task)
    }

    #[tokio::test]
    async fn readiness_timeout_closes_the_tunnel() {
        let tunnel = bound_but_never_ready().await;
        let local_port = tunnel.local_port();

        let err = ready_or_close(tunnel, Duration::from_millis(50))
            .await
            .err()
            .unwrap();

        assert_eq!(err.kind(), ErrorKind::TunnelTimeoutError);
        // The port is free as soon as the error is returned.
        assert!(TcpListener::bind((Ipv4Addr::LOCALHOST, local_port)).await.is_ok());
    }
}
