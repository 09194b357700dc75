//! In-flight packet persistence
//!
//! Collaborator for storing QoS > 0 packets across their acknowledgement
//! round-trip. The session records outbound publications before they hit
//! the wire and removes them on the terminal response; the default backend
//! discards everything.

use std::fmt;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::protocol::Packet;

/// Persistence backend failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceError(String);

impl PersistenceError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "persistence error: {}", self.0)
    }
}

impl std::error::Error for PersistenceError {}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/// Storage for in-flight packets, keyed by packet identifier.
///
/// All methods default to no-ops so backends only implement what they
/// support.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Store a packet under its identifier.
    async fn put(&self, _packet_id: u16, _packet: &Packet) -> Result<()> {
        Ok(())
    }

    /// Fetch a stored packet.
    async fn get(&self, _packet_id: u16) -> Result<Option<Packet>> {
        Ok(None)
    }

    /// Remove a stored packet.
    async fn delete(&self, _packet_id: u16) -> Result<()> {
        Ok(())
    }

    /// List every stored packet.
    async fn all(&self) -> Result<Vec<Packet>> {
        Ok(Vec::new())
    }

    /// Drop everything.
    async fn reset(&self) -> Result<()> {
        Ok(())
    }
}

/// Default backend that stores nothing
#[derive(Debug, Default)]
pub struct NoopPersistence;

#[async_trait]
impl Persistence for NoopPersistence {}

/// Process-memory backend, useful for tests and short-lived sessions
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    packets: DashMap<u16, Packet>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Persistence for MemoryPersistence {
    async fn put(&self, packet_id: u16, packet: &Packet) -> Result<()> {
        self.packets.insert(packet_id, packet.clone());
        Ok(())
    }

    async fn get(&self, packet_id: u16) -> Result<Option<Packet>> {
        Ok(self.packets.get(&packet_id).map(|e| e.value().clone()))
    }

    async fn delete(&self, packet_id: u16) -> Result<()> {
        self.packets.remove(&packet_id);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<Packet>> {
        Ok(self.packets.iter().map(|e| e.value().clone()).collect())
    }

    async fn reset(&self) -> Result<()> {
        self.packets.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Packet, PubAck};

    #[tokio::test]
    async fn memory_round_trip() {
        let store = MemoryPersistence::new();
        let packet = Packet::PubAck(PubAck::new(7));
        store.put(7, &packet).await.unwrap();
        assert_eq!(store.get(7).await.unwrap(), Some(packet));
        store.delete(7).await.unwrap();
        assert_eq!(store.get(7).await.unwrap(), None);
    }

    #[tokio::test]
    async fn noop_stores_nothing() {
        let store = NoopPersistence;
        store.put(1, &Packet::PingReq).await.unwrap();
        assert_eq!(store.get(1).await.unwrap(), None);
        assert!(store.all().await.unwrap().is_empty());
    }
}
