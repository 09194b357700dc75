//! Publish path
//!
//! QoS 0 is a single write. QoS 1 and 2 consume one slot of the
//! server-inflight window, correlate through the MID service, and settle
//! on the terminal frame the reader delivers: PUBACK for QoS 1, PUBCOMP
//! (or a failing PUBREC) for QoS 2.

use tokio::time::{timeout_at, Instant};
use tracing::warn;

use crate::error::ClientError;
use crate::mids::{pending_slot, MidGuard};
use crate::protocol::{Packet, PacketType, Publish, PublishResponse, QoS};

use super::Client;

impl Client {
    /// Send a publication to the server.
    ///
    /// Returns `Ok(None)` for QoS 0 and the mapped terminal response for
    /// QoS 1/2. A terminal frame with a failure reason code is surfaced as
    /// [`ClientError::PublishRejected`] carrying the parsed response.
    ///
    /// Panics if [`connect`](Self::connect) was never called.
    pub async fn publish(&self, publish: Publish) -> Result<Option<PublishResponse>, ClientError> {
        let core = &self.core;
        core.assert_connected();

        let server = *core.server_props.read();
        if publish.qos as u8 > server.maximum_qos {
            return Err(ClientError::Capability(format!(
                "cannot send publish with QoS {}, server maximum QoS is {}",
                publish.qos as u8, server.maximum_qos
            )));
        }
        if let Some(alias) = publish.properties.topic_alias {
            if server.topic_alias_maximum > 0 && alias > server.topic_alias_maximum {
                return Err(ClientError::Capability(format!(
                    "cannot send publish with topic alias {}, server topic alias maximum is {}",
                    alias, server.topic_alias_maximum
                )));
            }
        }
        if publish.retain && !server.retain_available {
            return Err(ClientError::Capability(
                "cannot send publish with retain flag set, server does not support retained messages"
                    .to_string(),
            ));
        }

        core.trace.on_publish(&publish);

        match publish.qos {
            QoS::AtMostOnce => {
                core.write(Packet::Publish(publish)).await?;
                Ok(None)
            }
            QoS::AtLeastOnce | QoS::ExactlyOnce => self.publish_qos12(publish).await.map(Some),
        }
    }

    async fn publish_qos12(&self, mut publish: Publish) -> Result<PublishResponse, ClientError> {
        let core = &self.core;
        let deadline = Instant::now() + core.packet_timeout;

        let gate = core
            .server_inflight
            .read()
            .clone()
            .ok_or(ClientError::Closed)?;
        let permit = match timeout_at(deadline, gate.acquire()).await {
            Ok(acquired) => acquired?,
            Err(_) => return Err(ClientError::Timeout),
        };

        let (pending, mut rx) = pending_slot();
        let id = match core.mids.request(pending) {
            Ok(id) => id,
            Err(e) => {
                permit.release();
                return Err(e);
            }
        };
        let guard = MidGuard::new(core.mids.clone(), id);

        publish.packet_id = Some(guard.id());
        let qos = publish.qos;
        let packet = Packet::Publish(publish);
        if let Err(e) = core.persistence.put(guard.id(), &packet).await {
            warn!(error = %e, "failed to persist in-flight publish");
        }
        if let Err(e) = core.write(packet).await {
            permit.release();
            return Err(e);
        }

        let response = match core.await_response(&mut rx, deadline).await {
            Ok(packet) => packet,
            Err(ClientError::Timeout) => {
                // The server may still consider the exchange in flight;
                // the window slot stays consumed.
                permit.forget();
                return Err(ClientError::Timeout);
            }
            Err(e) => {
                permit.release();
                return Err(e);
            }
        };
        if let Err(e) = core.persistence.delete(guard.id()).await {
            warn!(error = %e, "failed to drop persisted publish");
        }
        drop(guard);
        permit.release();

        match (qos, response) {
            (QoS::AtLeastOnce, Packet::PubAck(puback)) => {
                let reason = puback
                    .properties
                    .reason_string
                    .clone()
                    .unwrap_or_else(|| puback.reason_code.to_string());
                let response = PublishResponse::from(puback);
                if response.reason_code.is_failure() {
                    Err(ClientError::PublishRejected { response, reason })
                } else {
                    Ok(response)
                }
            }
            (QoS::ExactlyOnce, Packet::PubComp(pubcomp)) => Ok(PublishResponse::from(pubcomp)),
            (QoS::ExactlyOnce, Packet::PubRec(pubrec)) => Ok(PublishResponse::from(pubrec)),
            (_, other) => Err(ClientError::UnexpectedPacket {
                expected: if qos == QoS::AtLeastOnce {
                    PacketType::PubAck
                } else {
                    PacketType::PubComp
                },
                got: other.packet_type(),
            }),
        }
    }
}
