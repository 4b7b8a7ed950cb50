use tokio::sync::watch;

/// Sending half of a tunnel's stop signal.
///
/// The signal only ever moves from running to stopped, so calling
/// [`StopTx::stop`] more than once, or after every receiver is gone, is a no-op.
#[derive(Debug, Clone)]
pub struct StopTx(watch::Sender<bool>);

impl StopTx {
    pub fn stop(&self) {
        self.0.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    pub fn subscribe(&self) -> StopRx {
        StopRx(self.0.subscribe())
    }
}

/// Receiving half of a tunnel's stop signal.
#[derive(Debug, Clone)]
pub struct StopRx(watch::Receiver<bool>);

impl StopRx {
    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once a stop was requested.
    ///
    /// Dropping every [`StopTx`] counts as a stop request, so a tunnel whose
    /// owner went away winds down instead of running forever.
    pub async fn stopped(&mut self) {
        let _ = self.0.wait_for(|stopped| *stopped).await;
    }
}

pub fn create_stop_signal() -> (StopTx, StopRx) {
    let (tx, rx) = watch::channel(false);
    (StopTx(tx), StopRx(rx))
}
