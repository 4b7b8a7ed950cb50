use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::io::copy_bidirectional;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::bail;
use crate::concurrency::ready::ReadyTx;
use crate::concurrency::stop::StopRx;
use crate::error::{CrdbError, CrdbResult, ErrorKind};
use crate::tunnel::RemoteConnector;

/// Forwards connections accepted on `127.0.0.1:<local_port>` through a [`RemoteConnector`].
pub struct PortForwardTunnel {
    local_port: u16,
    connector: Arc<dyn RemoteConnector>,
}

impl PortForwardTunnel {
    pub fn new(local_port: u16, connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            local_port,
            connector,
        }
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Spawns the forwarding loop.
    ///
    /// `ready_tx` fires once the local port is bound, before any connection is
    /// accepted. The loop runs until `stop_rx` observes a stop, or until the
    /// remote end becomes unreachable, in which case the task resolves to a
    /// [`ErrorKind::RemoteUnreachableError`]. Failing to bind resolves to a
    /// [`ErrorKind::TunnelStartError`] without signalling readiness.
    pub fn start(self, stop_rx: StopRx, ready_tx: ReadyTx) -> JoinHandle<CrdbResult<()>> {
        let span = info_span!("tunnel", local_port = self.local_port);
        tokio::spawn(self.run(stop_rx, ready_tx).instrument(span))
    }

    async fn run(self, mut stop_rx: StopRx, ready_tx: ReadyTx) -> CrdbResult<()> {
        let listener = match TcpListener::bind((Ipv4Addr::LOCALHOST, self.local_port)).await {
            Ok(listener) => listener,
            Err(err) => bail!(
                ErrorKind::TunnelStartError,
                "Failed to bind the tunnel's local port",
                format!("127.0.0.1:{}: {err}", self.local_port)
            ),
        };

        ready_tx.ready();
        info!("tunnel is accepting connections");

        let mut connections = JoinSet::new();
        let mut result = loop {
            tokio::select! {
                biased;

                _ = stop_rx.stopped() => {
                    info!("stop requested, shutting down tunnel");
                    break Ok(());
                }

                Some(joined) = connections.join_next() => {
                    if let Some(err) = unreachable_remote(joined) {
                        warn!(error = %err, "remote end is unreachable, shutting down tunnel");
                        break Err(err);
                    }
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let connector = self.connector.clone();
                            connections.spawn(
                                forward_connection(stream, connector)
                                    .instrument(info_span!("connection", %peer)),
                            );
                        }
                        Err(err) => warn!(error = %err, "failed to accept a local connection"),
                    }
                }
            }
        };

        // Release the port before the in-flight connections are torn down.
        drop(listener);
        connections.abort_all();
        while let Some(joined) = connections.join_next().await {
            // A connection that failed right before the stop still reports its failure.
            if let Some(err) = unreachable_remote(joined)
                && result.is_ok()
            {
                result = Err(err);
            }
        }
        info!("tunnel stopped");

        result
    }
}

/// Logs the outcome of a finished connection and returns its error if the
/// remote end turned out to be unreachable.
fn unreachable_remote(joined: Result<CrdbResult<()>, JoinError>) -> Option<CrdbError> {
    match joined {
        Ok(Ok(())) => None,
        Ok(Err(err)) if err.kind() == ErrorKind::RemoteUnreachableError => Some(err),
        Ok(Err(err)) => {
            warn!(error = %err, "forwarded connection failed");
            None
        }
        Err(err) if err.is_cancelled() => None,
        Err(err) => {
            warn!(error = %err, "forwarded connection task failed");
            None
        }
    }
}

async fn forward_connection(
    mut local: TcpStream,
    connector: Arc<dyn RemoteConnector>,
) -> CrdbResult<()> {
    let mut remote = connector.connect().await?;
    debug!("forwarding connection");

    match copy_bidirectional(&mut local, &mut remote).await {
        Ok((sent, received)) => debug!(sent, received, "forwarded connection closed"),
        Err(err) => debug!(error = %err, "forwarded connection closed with an error"),
    }

    Ok(())
}

