//! Single-shot broadcast signal
//!
//! Models the exit and done latches of a session: set exactly once, after
//! which every waiter (present and future) observes readiness.

use tokio::sync::watch;

pub(crate) struct Signal {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl Signal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Latch the signal. Idempotent.
    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the signal is set. Returns immediately if already set.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as self, so wait_for cannot fail here.
        let _ = rx.wait_for(|set| *set).await;
    }
}
