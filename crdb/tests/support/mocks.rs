use async_trait::async_trait;
use crdb::bail;
use crdb::error::{CrdbResult, ErrorKind};
use crdb::k8s::{K8sClient, K8sError, PodRef};
use crdb::tunnel::{BoxedRemoteStream, RemoteConnector};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpStream;

/// Connects straight to a TCP address instead of going through the API server.
pub struct TcpConnector {
    addr: SocketAddr,
    connects: AtomicUsize,
}

impl TcpConnector {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteConnector for TcpConnector {
    async fn connect(&self) -> CrdbResult<BoxedRemoteStream> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        match TcpStream::connect(self.addr).await {
            Ok(stream) => Ok(Box::new(stream)),
            Err(err) => bail!(
                ErrorKind::RemoteUnreachableError,
                "Failed to reach the remote address",
                err
            ),
        }
    }
}

/// A connector whose remote end is gone.
pub struct UnreachableConnector;

#[async_trait]
impl RemoteConnector for UnreachableConnector {
    async fn connect(&self) -> CrdbResult<BoxedRemoteStream> {
        bail!(ErrorKind::RemoteUnreachableError, "Pod is gone");
    }
}

pub struct MockK8sClient {
    connector: Arc<dyn RemoteConnector>,
    has_pods: bool,
    pod_lookups: AtomicUsize,
}

impl MockK8sClient {
    pub fn with_connector(connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            connector,
            has_pods: true,
            pod_lookups: AtomicUsize::new(0),
        }
    }

    pub fn forwarding_to(addr: SocketAddr) -> Self {
        Self::with_connector(Arc::new(TcpConnector::new(addr)))
    }

    pub fn without_pods() -> Self {
        Self {
            has_pods: false,
            ..Self::with_connector(Arc::new(UnreachableConnector))
        }
    }

    pub fn pod_lookups(&self) -> usize {
        self.pod_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl K8sClient for MockK8sClient {
    async fn get_service_pod(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> Result<PodRef, K8sError> {
        self.pod_lookups.fetch_add(1, Ordering::SeqCst);

        if !self.has_pods {
            return Err(K8sError::NoRunningPod {
                namespace: namespace.to_owned(),
                service: service_name.to_owned(),
            });
        }

        Ok(PodRef {
            namespace: namespace.to_owned(),
            name: format!("{service_name}-0"),
        })
    }

    fn pod_connector(&self, _pod: &PodRef, _remote_port: u16) -> Arc<dyn RemoteConnector> {
        self.connector.clone()
    }
}
