//! Subscribe and unsubscribe paths
//!
//! Both follow the same request/response shape: pre-flight capability
//! checks, a packet identifier with its pending slot, one write, then a
//! deadline-bounded wait for the matching ack.

use tokio::time::Instant;
use tracing::debug;

use crate::error::ClientError;
use crate::mids::{pending_slot, MidGuard};
use crate::protocol::{Packet, PacketType, SubAck, Subscribe, UnsubAck, Unsubscribe};

use super::Client;

impl Client {
    /// Send a subscription request and wait for its SUBACK.
    ///
    /// Requests that violate the server's negotiated capabilities are
    /// rejected before touching the wire. A SUBACK carrying failure codes
    /// is surfaced as [`ClientError::SubscribeRejected`] with the parsed
    /// ack inside.
    ///
    /// Panics if [`connect`](Self::connect) was never called.
    pub async fn subscribe(&self, mut subscribe: Subscribe) -> Result<SubAck, ClientError> {
        let core = &self.core;
        core.assert_connected();

        let server = *core.server_props.read();
        if !server.wildcard_sub_available {
            for sub in &subscribe.subscriptions {
                if sub.filter.contains(&['#', '+'][..]) {
                    return Err(ClientError::Capability(format!(
                        "cannot subscribe to {}, server does not support wildcards",
                        sub.filter
                    )));
                }
            }
        }
        if !server.sub_id_available && !subscribe.properties.subscription_identifiers.is_empty() {
            return Err(ClientError::Capability(
                "cannot send subscribe with subscription identifier set, \
                 server does not support subscription identifiers"
                    .to_string(),
            ));
        }
        if !server.shared_sub_available {
            for sub in &subscribe.subscriptions {
                if sub.filter.starts_with("$share") {
                    return Err(ClientError::Capability(format!(
                        "cannot subscribe to {}, server does not support shared subscriptions",
                        sub.filter
                    )));
                }
            }
        }

        debug!(subscriptions = ?subscribe.subscriptions, "subscribing");

        let deadline = Instant::now() + core.packet_timeout;
        let (pending, mut rx) = pending_slot();
        let guard = MidGuard::new(core.mids.clone(), core.mids.request(pending)?);
        subscribe.packet_id = guard.id();

        core.write(Packet::Subscribe(subscribe)).await?;
        debug!("waiting for SUBACK");
        let response = core.await_response(&mut rx, deadline).await?;
        drop(guard);

        let suback = match response {
            Packet::SubAck(suback) => suback,
            other => {
                return Err(ClientError::UnexpectedPacket {
                    expected: PacketType::SubAck,
                    got: other.packet_type(),
                })
            }
        };

        if suback.reason_codes.len() == 1 {
            if suback.reason_codes[0].is_failure() {
                debug!(code = %suback.reason_codes[0], "error code in SUBACK");
                let reason = suback
                    .properties
                    .reason_string
                    .clone()
                    .unwrap_or_else(|| suback.reason_codes[0].to_string());
                return Err(ClientError::SubscribeRejected { suback, reason });
            }
        } else if suback.reason_codes.iter().any(|code| code.is_failure()) {
            return Err(ClientError::SubscribeRejected {
                suback,
                reason: "at least one requested subscription failed".to_string(),
            });
        }

        Ok(suback)
    }

    /// Send an unsubscription request and wait for its UNSUBACK.
    ///
    /// Panics if [`connect`](Self::connect) was never called.
    pub async fn unsubscribe(
        &self,
        mut unsubscribe: Unsubscribe,
    ) -> Result<UnsubAck, ClientError> {
        let core = &self.core;
        core.assert_connected();

        debug!(filters = ?unsubscribe.filters, "unsubscribing");

        let deadline = Instant::now() + core.packet_timeout;
        let (pending, mut rx) = pending_slot();
        let guard = MidGuard::new(core.mids.clone(), core.mids.request(pending)?);
        unsubscribe.packet_id = guard.id();

        core.write(Packet::Unsubscribe(unsubscribe)).await?;
        debug!("waiting for UNSUBACK");
        let response = core.await_response(&mut rx, deadline).await?;
        drop(guard);

        let unsuback = match response {
            Packet::UnsubAck(unsuback) => unsuback,
            other => {
                return Err(ClientError::UnexpectedPacket {
                    expected: PacketType::UnsubAck,
                    got: other.packet_type(),
                })
            }
        };

        if unsuback.reason_codes.len() == 1 {
            if unsuback.reason_codes[0].is_failure() {
                debug!(code = %unsuback.reason_codes[0], "error code in UNSUBACK");
                let reason = unsuback
                    .properties
                    .reason_string
                    .clone()
                    .unwrap_or_else(|| unsuback.reason_codes[0].to_string());
                return Err(ClientError::UnsubscribeRejected { unsuback, reason });
            }
        } else if unsuback.reason_codes.iter().any(|code| code.is_failure()) {
            return Err(ClientError::UnsubscribeRejected {
                unsuback,
                reason: "at least one requested unsubscribe failed".to_string(),
            });
        }

        Ok(unsuback)
    }
}
