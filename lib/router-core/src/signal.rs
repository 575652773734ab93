//! Level-triggered wake-ups for the control loop
//!
//! Any number of event sources share one [`Signaler`]. Bursts of events are
//! rolled up into a single pending token, which suits a controller that
//! recomputes the whole world on every pass and needs no ordering between
//! sources.

use tokio::sync::mpsc;

/// Create a connected signaler and receiver pair backed by a one-slot buffer.
pub fn channel() -> (Signaler, Signals) {
    let (tx, rx) = mpsc::channel(1);
    (Signaler { tx }, Signals { rx })
}

/// Sending half, cloned into every event source.
#[derive(Clone, Debug)]
pub struct Signaler {
    tx: mpsc::Sender<()>,
}

impl Signaler {
    /// Record that something changed. Never blocks; a no-op when a token is
    /// already pending or the receiver is gone.
    pub fn event(&self) {
        let _ = self.tx.try_send(());
    }
}

/// Receiving half, owned by the control loop.
#[derive(Debug)]
pub struct Signals {
    rx: mpsc::Receiver<()>,
}

impl Signals {
    /// Wait for the next token. Returns `false` once every [`Signaler`] has
    /// been dropped and no token is pending.
    pub async fn recv(&mut self) -> bool {
        self.rx.recv().await.is_some()
    }

    /// Take a pending token without waiting.
    pub fn try_recv(&mut self) -> bool {
        self.rx.try_recv().is_ok()
    }
}
