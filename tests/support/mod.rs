//! Shared helpers for session tests
//!
//! Provides an in-memory packet connection so tests can play the broker
//! side of a session: packets the client writes arrive on the broker end,
//! and packets the broker end sends arrive at the client's reader.

#![allow(dead_code)]

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::timeout;

use tethermq::protocol::{ConnAck, Connect, Packet};
use tethermq::transport::{PacketConn, PacketSink, PacketSource, TransportError};
use tethermq::{Client, ClientConfig};

/// Client-side end of an in-memory packet connection
pub struct MemoryConn {
    tx: mpsc::Sender<Packet>,
    rx: mpsc::Receiver<Packet>,
}

/// Broker-side end of an in-memory packet connection.
///
/// Dropping `tx` reads as a clean EOF at the client.
pub struct Broker {
    pub tx: mpsc::Sender<Packet>,
    pub rx: mpsc::Receiver<Packet>,
}

pub fn conn_pair() -> (MemoryConn, Broker) {
    let (client_tx, broker_rx) = mpsc::channel(64);
    let (broker_tx, client_rx) = mpsc::channel(64);
    (
        MemoryConn {
            tx: client_tx,
            rx: client_rx,
        },
        Broker {
            tx: broker_tx,
            rx: broker_rx,
        },
    )
}

impl PacketConn for MemoryConn {
    fn split(self: Box<Self>) -> (Box<dyn PacketSink>, Box<dyn PacketSource>) {
        (
            Box::new(MemorySink { tx: self.tx }),
            Box::new(MemorySource { rx: self.rx }),
        )
    }
}

struct MemorySink {
    tx: mpsc::Sender<Packet>,
}

#[async_trait]
impl PacketSink for MemorySink {
    async fn write_packet(&mut self, packet: &Packet) -> Result<(), TransportError> {
        self.tx
            .send(packet.clone())
            .await
            .map_err(|_| TransportError::Closed)
    }
}

struct MemorySource {
    rx: mpsc::Receiver<Packet>,
}

#[async_trait]
impl PacketSource for MemorySource {
    async fn read_packet(&mut self) -> Result<Packet, TransportError> {
        self.rx.recv().await.ok_or(TransportError::Closed)
    }
}

impl Broker {
    /// Next packet written by the client, bounded so a broken test fails
    /// instead of hanging.
    pub async fn recv(&mut self) -> Packet {
        timeout(Duration::from_secs(5), self.rx.recv())
            .await
            .expect("timed out waiting for a client packet")
            .expect("client connection dropped")
    }

    pub async fn send(&self, packet: Packet) {
        self.tx.send(packet).await.expect("client connection dropped");
    }

    pub async fn expect_connect(&mut self) -> Connect {
        match self.recv().await {
            Packet::Connect(connect) => *connect,
            other => panic!("expected CONNECT, got {:?}", other),
        }
    }

    /// Answer the handshake with the given CONNACK, returning the CONNECT
    /// the client sent.
    pub async fn accept_connect_with(&mut self, connack: ConnAck) -> Connect {
        let connect = self.expect_connect().await;
        self.send(Packet::ConnAck(connack)).await;
        connect
    }

    pub async fn accept_connect(&mut self) -> Connect {
        self.accept_connect_with(ConnAck::default()).await
    }

    /// Assert the client has written nothing further.
    pub async fn assert_idle(&mut self) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        match self.rx.try_recv() {
            Err(mpsc::error::TryRecvError::Empty) => {}
            other => panic!("expected no client packet, got {:?}", other),
        }
    }
}

/// Route client logs into the test harness when RUST_LOG asks for them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Construct a client over a fresh in-memory connection.
pub fn client_with(mut config: ClientConfig) -> (Client, Broker) {
    init_tracing();
    let (conn, broker) = conn_pair();
    config.conn = Some(Box::new(conn));
    (Client::new(config), broker)
}

/// Client connected with defaults and the given CONNACK.
pub async fn connected_with(connack: ConnAck) -> (Client, Broker) {
    let (client, mut broker) = client_with(ClientConfig::default());
    let connecting = client.clone();
    let handshake = tokio::spawn(async move {
        connecting
            .connect(Connect {
                client_id: "test-client".to_string(),
                ..Default::default()
            })
            .await
    });
    broker.accept_connect_with(connack).await;
    handshake
        .await
        .expect("connect task panicked")
        .expect("handshake failed");
    (client, broker)
}

pub async fn connected() -> (Client, Broker) {
    connected_with(ConnAck::default()).await
}
