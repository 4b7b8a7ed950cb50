use std::time::Duration;
use tokio::task::JoinHandle;

use crate::concurrency::ready::{ReadyRx, create_ready_signal};
use crate::concurrency::stop::{StopTx, create_stop_signal};
use crate::crdb_error;
use crate::error::{CrdbResult, ErrorKind};
use crate::tunnel::PortForwardTunnel;

/// Owner of a running [`PortForwardTunnel`].
///
/// Dropping the handle stops the tunnel. Use [`TunnelHandle::close`] to also
/// wait until the local port is released.
pub struct TunnelHandle {
    local_port: u16,
    stop_tx: StopTx,
    ready_rx: ReadyRx,
    task: Option<JoinHandle<CrdbResult<()>>>,
}

impl TunnelHandle {
    /// Starts `tunnel` and returns its handle.
    pub fn start(tunnel: PortForwardTunnel) -> Self {
        let (stop_tx, stop_rx) = create_stop_signal();
        let (ready_tx, ready_rx) = create_ready_signal();
        let local_port = tunnel.local_port();
        let task = tunnel.start(stop_rx, ready_tx);

        Self {
            local_port,
            stop_tx,
            ready_rx,
            task: Some(task),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_parts(
        local_port: u16,
        stop_tx: StopTx,
        ready_rx: ReadyRx,
        task: JoinHandle<CrdbResult<()>>,
    ) -> Self {
        Self {
            local_port,
            stop_tx,
            ready_rx,
            task: Some(task),
        }
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    pub fn is_ready(&self) -> bool {
        self.ready_rx.is_ready()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_tx.is_stopped()
    }

    /// Requests the tunnel to stop. Safe to call any number of times.
    pub fn stop(&self) {
        self.stop_tx.stop();
    }

    /// Waits until the tunnel accepts connections, for at most `timeout`.
    ///
    /// When the tunnel exits before becoming ready its own error is returned,
    /// typically a [`ErrorKind::TunnelStartError`].
    pub async fn wait_ready(&mut self, timeout: Duration) -> CrdbResult<()> {
        let mut ready_rx = self.ready_rx.clone();
        match tokio::time::timeout(timeout, ready_rx.wait()).await {
            Ok(true) => Ok(()),
            Ok(false) => match self.join().await {
                Err(err) => Err(err),
                Ok(()) => Err(crdb_error!(
                    ErrorKind::TunnelStartError,
                    "Tunnel exited before it became ready"
                )),
            },
            Err(_) => Err(crdb_error!(
                ErrorKind::TunnelTimeoutError,
                "Tunnel did not become ready in time",
                format!("{timeout:?}")
            )),
        }
    }

    /// Stops the tunnel and waits for its loop to exit.
    ///
    /// Returns the loop's error if it terminated on its own, for example
    /// because the remote end became unreachable.
    pub async fn close(mut self) -> CrdbResult<()> {
        self.stop();
        self.join().await
    }

    async fn join(&mut self) -> CrdbResult<()> {
        match self.task.take() {
            Some(task) => task.await?,
            None => Ok(()),
        }
    }
}

impl Drop for TunnelHandle {
    fn drop(&mut self) {
        self.stop_tx.stop();
    }
}
