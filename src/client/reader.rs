//! Reader loop
//!
//! Sole consumer of the connection's read half. Parses each inbound packet
//! and dispatches by type: pong delivery, handshake completion, the
//! enhanced-auth exchange, publication routing with automatic
//! acknowledgement, and correlation of acks to their pending requests.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::debug;

use crate::error::ClientError;
use crate::protocol::{
    Packet, PubAck, PubComp, PubRec, PubRel, QoS, ReasonCode,
};
use crate::transport::{PacketSource, TransportError};

use super::ClientCore;

impl ClientCore {
    pub(crate) fn spawn_reader(self: &Arc<Self>, source: Box<dyn PacketSource>) {
        self.reader_started.store(true, Ordering::Release);
        let core = self.clone();
        tokio::spawn(async move { core.reader(source).await });
    }

    async fn reader(self: Arc<Self>, mut source: Box<dyn PacketSource>) {
        loop {
            let packet = tokio::select! {
                _ = self.exit.wait() => break,
                read = source.read_packet() => match read {
                    Ok(packet) => packet,
                    Err(TransportError::Closed) => {
                        // Clean EOF from the server.
                        self.close();
                        break;
                    }
                    Err(e) => {
                        self.fail(ClientError::from(e));
                        break;
                    }
                },
            };
            self.trace.on_recv(&packet);
            if !self.handle_packet(packet).await {
                break;
            }
        }
        debug!("reader stopped");
        self.reader_done.set();
    }

    /// Dispatch one inbound packet. Returns false when the reader must
    /// stop.
    async fn handle_packet(self: &Arc<Self>, packet: Packet) -> bool {
        match packet {
            Packet::PingResp => {
                // Capacity-1 slot; an overflowing pong carries no extra
                // information and is discarded.
                let _ = self.pong_tx.try_send(());
            }

            Packet::ConnAck(connack) => {
                let slot = self.connack_tx.lock().clone();
                match slot {
                    Some(tx) => {
                        let _ = tx.try_send(connack);
                    }
                    None => debug!("CONNACK with no handshake in progress"),
                }
            }

            Packet::Auth(auth) => match auth.reason_code {
                ReasonCode::Success => {
                    if let Some(handler) = &self.auth_handler {
                        let handler = handler.clone();
                        tokio::spawn(async move { handler.authenticated().await });
                    }
                    if let Some(tx) = self.reauth_slot() {
                        let _ = tx.try_send(Packet::Auth(auth));
                    }
                }
                ReasonCode::ContinueAuthentication => {
                    if let Some(handler) = &self.auth_handler {
                        let next = handler.authenticate(auth).await;
                        if let Err(e) = self.write(Packet::Auth(next)).await {
                            self.fail(e);
                            return false;
                        }
                    }
                }
                other => {
                    debug!(code = %other, "AUTH with unexpected reason code");
                }
            },

            Packet::Publish(publish) => {
                // A slow handler must not stall the reader.
                let router = self.router.clone();
                let routed = publish.clone();
                tokio::spawn(async move { router.route(routed) });

                match publish.qos {
                    QoS::AtLeastOnce => {
                        if let Some(pid) = publish.packet_id {
                            let _ = self.write(Packet::PubAck(PubAck::new(pid))).await;
                        }
                    }
                    QoS::ExactlyOnce => {
                        if let Some(pid) = publish.packet_id {
                            let _ = self.write(Packet::PubRec(PubRec::new(pid))).await;
                        }
                    }
                    QoS::AtMostOnce => {}
                }
            }

            Packet::PubAck(_) | Packet::PubComp(_) | Packet::SubAck(_) | Packet::UnsubAck(_) => {
                if let Some(id) = packet.packet_id() {
                    match self.mids.get(id) {
                        Some(pending) => {
                            pending.deliver(packet);
                        }
                        None => debug!(id, "response for a packet id we don't know"),
                    }
                }
            }

            Packet::PubRec(pubrec) => match self.mids.get(pubrec.packet_id) {
                None => {
                    debug!(id = pubrec.packet_id, "PUBREC for a packet id we don't know");
                    let reply = PubRel {
                        packet_id: pubrec.packet_id,
                        reason_code: ReasonCode::PacketIdNotFound,
                        ..Default::default()
                    };
                    let _ = self.write(Packet::PubRel(reply)).await;
                }
                Some(pending) => {
                    if pubrec.reason_code.is_failure() {
                        // Failure shortcuts the exchange back to the caller.
                        pending.deliver(Packet::PubRec(pubrec));
                    } else {
                        let reply = PubRel::new(pubrec.packet_id);
                        let _ = self.write(Packet::PubRel(reply)).await;
                    }
                }
            },

            Packet::PubRel(pubrel) => {
                // Inbound releases need no bookkeeping in this client;
                // answer failure codes so the server can drop its state.
                if pubrel.reason_code.is_failure() {
                    let _ = self
                        .write(Packet::PubComp(PubComp::new(pubrel.packet_id)))
                        .await;
                }
            }

            Packet::Disconnect(disconnect) => {
                if let Some(tx) = self.reauth_slot() {
                    let _ = tx.try_send(Packet::Disconnect(disconnect.clone()));
                }
                self.fail(ClientError::ServerDisconnect(disconnect));
                return false;
            }

            Packet::Connect(_) | Packet::Subscribe(_) | Packet::Unsubscribe(_) | Packet::PingReq => {
                debug!(
                    packet_type = %packet.packet_type(),
                    "ignoring client-to-server packet from server"
                );
            }
        }
        true
    }
}
