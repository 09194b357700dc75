//! Receive-maximum flow control
//!
//! Each side of a session declares how many QoS > 0 publications it is
//! willing to hold in flight. The session enforces its outbound share of
//! that contract with a counting semaphore sized from the server's
//! receive maximum, and mirrors one for the client's own declared window.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::ClientError;

/// Counting gate bounding in-flight QoS > 0 publications.
#[derive(Clone)]
pub(crate) struct InflightGate {
    sem: Arc<Semaphore>,
    capacity: u16,
}

impl InflightGate {
    pub fn new(capacity: u16) -> Self {
        Self {
            sem: Arc::new(Semaphore::new(capacity as usize)),
            capacity,
        }
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    /// Wait for a free slot in the window. Callers bound this with their
    /// operation deadline.
    pub async fn acquire(&self) -> Result<InflightPermit, ClientError> {
        match self.sem.clone().acquire_owned().await {
            Ok(permit) => Ok(InflightPermit(permit)),
            Err(_) => Err(ClientError::Closed),
        }
    }

    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.sem.available_permits()
    }
}

/// One slot of an [`InflightGate`]'s window.
pub(crate) struct InflightPermit(OwnedSemaphorePermit);

impl InflightPermit {
    /// Return the slot to the window.
    pub fn release(self) {}

    /// Keep the slot consumed. Used when a publish deadline fires while the
    /// server may still consider the exchange in flight.
    pub fn forget(self) {
        self.0.forget();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn release_returns_slot() {
        let gate = InflightGate::new(1);
        let permit = gate.acquire().await.unwrap();
        assert_eq!(gate.available(), 0);
        permit.release();
        assert_eq!(gate.available(), 1);
    }

    #[tokio::test]
    async fn forget_keeps_slot_consumed() {
        let gate = InflightGate::new(2);
        let permit = gate.acquire().await.unwrap();
        permit.forget();
        assert_eq!(gate.available(), 1);
        assert_eq!(gate.capacity(), 2);
    }

    #[tokio::test]
    async fn acquire_blocks_at_capacity() {
        let gate = InflightGate::new(1);
        let _held = gate.acquire().await.unwrap();
        let starved = timeout(Duration::from_millis(20), gate.acquire()).await;
        assert!(starved.is_err());
    }
}
