//! TetherMQ - asynchronous MQTT v5 client session engine
//!
//! Drives one MQTT v5 session over a caller-supplied byte stream. The
//! crate owns the session mechanics - the concurrent writer/reader/pinger
//! loops, packet identifier correlation, receive-maximum flow control, the
//! connect-once handshake, and topic-based dispatch of inbound
//! publications - while byte-level packet serialization stays behind the
//! [`transport`] codec seam.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tethermq::{Client, ClientConfig};
//! use tethermq::protocol::{Connect, Publish, QoS};
//!
//! # async fn run(conn: Box<dyn tethermq::transport::PacketConn>) -> Result<(), tethermq::ClientError> {
//! let client = Client::new(ClientConfig {
//!     conn: Some(conn),
//!     ..Default::default()
//! });
//! client.router().register_handler(
//!     "sensors/+/temp",
//!     Arc::new(|publish: &Publish| println!("{}: {:?}", publish.topic, publish.payload)),
//! );
//! client.connect(Connect {
//!     client_id: "sensor-hub".to_string(),
//!     ..Default::default()
//! }).await?;
//! client.publish(Publish {
//!     topic: "sensors/a/temp".to_string(),
//!     qos: QoS::AtLeastOnce,
//!     payload: b"21.5".as_ref().into(),
//!     ..Default::default()
//! }).await?;
//! client.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub(crate) mod flow;
pub mod hooks;
pub mod mids;
pub mod persistence;
pub mod protocol;
pub mod router;
pub mod transport;

pub use client::{
    Client, ClientConfig, CommsProperties, DEFAULT_KEEP_ALIVE, DEFAULT_PACKET_TIMEOUT,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
pub use error::ClientError;
pub use hooks::{AuthHandler, DefaultTrace, Trace};
pub use mids::{MidService, StandardMids};
pub use persistence::{MemoryPersistence, NoopPersistence, Persistence};
pub use router::{MessageHandler, Router, SingleHandlerRouter, StandardRouter};
pub use transport::{FramedConn, PacketConn, PacketSink, PacketSource};
