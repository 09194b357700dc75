//! Packet identifier service
//!
//! Allocates the 16-bit identifiers that correlate QoS > 0 publications and
//! subscription requests with their acks, and maps each live identifier to
//! the single-slot mailbox its response is delivered on.

use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::protocol::Packet;

/// Single-slot mailbox for the response to one in-flight request.
///
/// The requester holds the receiving end; the reader loop delivers through
/// the registered `Pending`. Delivery never blocks: the slot has capacity
/// one and at most one response is expected per identifier.
#[derive(Debug)]
pub struct Pending {
    tx: mpsc::Sender<Packet>,
}

impl Pending {
    /// Deliver the response packet. Returns false if the slot is already
    /// occupied or the requester has gone away.
    pub fn deliver(&self, packet: Packet) -> bool {
        self.tx.try_send(packet).is_ok()
    }
}

/// Create a pending slot and the receiver its response arrives on.
pub fn pending_slot() -> (Arc<Pending>, mpsc::Receiver<Packet>) {
    let (tx, rx) = mpsc::channel(1);
    (Arc::new(Pending { tx }), rx)
}

/// Packet identifier allocator and in-flight correlation table.
///
/// Invariants: identifiers are in `[1, 65535]`, no two live requests share
/// one, and every allocated identifier is freed exactly once.
pub trait MidService: Send + Sync {
    /// Allocate a free identifier and register the pending slot under it.
    fn request(&self, pending: Arc<Pending>) -> Result<u16, ClientError>;

    /// Look up the pending slot registered under an identifier.
    fn get(&self, id: u16) -> Option<Arc<Pending>>;

    /// Release an identifier and drop its registration.
    fn free(&self, id: u16);
}

/// Default [`MidService`] backed by a concurrent map and a rotating cursor.
#[derive(Debug, Default)]
pub struct StandardMids {
    next: AtomicU16,
    index: DashMap<u16, Arc<Pending>>,
}

impl StandardMids {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MidService for StandardMids {
    fn request(&self, pending: Arc<Pending>) -> Result<u16, ClientError> {
        // One full sweep of the identifier space; zero is never issued.
        for _ in 0..=u16::MAX as u32 {
            let id = self.next.fetch_add(1, Ordering::Relaxed);
            if id == 0 {
                continue;
            }
            match self.index.entry(id) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&pending));
                    return Ok(id);
                }
            }
        }
        Err(ClientError::MidsExhausted)
    }

    fn get(&self, id: u16) -> Option<Arc<Pending>> {
        self.index.get(&id).map(|entry| entry.value().clone())
    }

    fn free(&self, id: u16) {
        self.index.remove(&id);
    }
}

/// Frees the guarded identifier when the request settles, whichever way.
pub(crate) struct MidGuard {
    mids: Arc<dyn MidService>,
    id: u16,
}

impl MidGuard {
    pub fn new(mids: Arc<dyn MidService>, id: u16) -> Self {
        Self { mids, id }
    }

    pub fn id(&self) -> u16 {
        self.id
    }
}

impl Drop for MidGuard {
    fn drop(&mut self) {
        self.mids.free(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn allocates_distinct_ids() {
        let mids = StandardMids::new();
        let (pending, _rx1) = pending_slot();
        let a = mids.request(pending).unwrap();
        let (pending, _rx2) = pending_slot();
        let b = mids.request(pending).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, 0);
        assert_ne!(b, 0);
    }

    #[test]
    fn free_makes_id_reusable() {
        let mids = StandardMids::new();
        let (pending, _rx) = pending_slot();
        let id = mids.request(pending).unwrap();
        assert!(mids.get(id).is_some());
        mids.free(id);
        assert!(mids.get(id).is_none());
    }

    #[test]
    fn exhaustion_reported() {
        let mids = StandardMids::new();
        let mut receivers = Vec::new();
        for _ in 1..=u16::MAX {
            let (pending, rx) = pending_slot();
            mids.request(pending).unwrap();
            receivers.push(rx);
        }
        let (pending, _rx) = pending_slot();
        assert_eq!(mids.request(pending), Err(ClientError::MidsExhausted));
    }

    #[tokio::test]
    async fn delivery_reaches_receiver() {
        let mids = StandardMids::new();
        let (pending, mut rx) = pending_slot();
        let id = mids.request(pending).unwrap();
        let slot = mids.get(id).unwrap();
        assert!(slot.deliver(Packet::PingResp));
        assert_eq!(rx.recv().await, Some(Packet::PingResp));
    }
}
