use tokio::sync::watch;

/// Sending half of a tunnel's readiness signal.
///
/// [`ReadyTx::ready`] consumes the sender, so readiness fires at most once.
/// Dropping the sender without calling it tells waiters the tunnel will never
/// become ready.
#[derive(Debug)]
pub struct ReadyTx(watch::Sender<bool>);

impl ReadyTx {
    pub fn ready(self) {
        self.0.send_replace(true);
    }
}

/// Receiving half of a tunnel's readiness signal.
#[derive(Debug, Clone)]
pub struct ReadyRx(watch::Receiver<bool>);

impl ReadyRx {
    pub fn is_ready(&self) -> bool {
        *self.0.borrow()
    }

    /// Waits until the tunnel is ready.
    ///
    /// Returns `false` if the sender was dropped before signalling readiness.
    pub async fn wait(&mut self) -> bool {
        self.0.wait_for(|ready| *ready).await.is_ok()
    }
}

pub fn create_ready_signal() -> (ReadyTx, ReadyRx) {
    let (tx, rx) = watch::channel(false);
    (ReadyTx(tx), ReadyRx(rx))
}
