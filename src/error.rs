//! Client error types

use std::fmt;
use std::time::Duration;

use crate::protocol::{ConnAck, Disconnect, PacketType, PublishResponse, SubAck, UnsubAck};
use crate::transport::TransportError;

/// Errors surfaced by session operations.
///
/// Server-failure variants carry the parsed ack so that callers can inspect
/// per-entry reason codes even when the operation is reported as failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    /// Connect was called without a connection configured
    MissingConnection,
    /// The session has been torn down
    Closed,
    /// The caller deadline or the packet timeout elapsed
    Timeout,
    /// The packet identifier space is exhausted
    MidsExhausted,
    /// A pre-flight check against the negotiated server capabilities failed
    Capability(String),
    /// The server answered a request with the wrong packet type
    UnexpectedPacket {
        expected: PacketType,
        got: PacketType,
    },
    /// The server refused the connection (CONNACK reason >= 0x80)
    ConnectRejected { connack: ConnAck, reason: String },
    /// The server refused a subscription (SUBACK reason >= 0x80)
    SubscribeRejected { suback: SubAck, reason: String },
    /// The server refused an unsubscription (UNSUBACK reason >= 0x80)
    UnsubscribeRejected { unsuback: UnsubAck, reason: String },
    /// The server refused a publication (terminal reason >= 0x80)
    PublishRejected {
        response: PublishResponse,
        reason: String,
    },
    /// A reauthentication exchange is already in progress
    AuthInProgress,
    /// The server terminated the session with a DISCONNECT
    ServerDisconnect(Disconnect),
    /// Read or write failure on the underlying stream
    Transport(String),
    /// No PINGRESP for more than twice the keepalive interval
    KeepAliveTimeout(Duration),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingConnection => write!(f, "client connection is not set"),
            Self::Closed => write!(f, "client closed"),
            Self::Timeout => write!(f, "operation timed out"),
            Self::MidsExhausted => write!(f, "packet identifier space exhausted"),
            Self::Capability(msg) => write!(f, "{}", msg),
            Self::UnexpectedPacket { expected, got } => {
                write!(f, "received {} instead of {}", got, expected)
            }
            Self::ConnectRejected { reason, .. } => {
                write!(f, "failed to connect to server: {}", reason)
            }
            Self::SubscribeRejected { reason, .. } => {
                write!(f, "failed to subscribe to topic: {}", reason)
            }
            Self::UnsubscribeRejected { reason, .. } => {
                write!(f, "failed to unsubscribe from topic: {}", reason)
            }
            Self::PublishRejected { reason, .. } => write!(f, "error publishing: {}", reason),
            Self::AuthInProgress => write!(f, "previous auth is still in progress"),
            Self::ServerDisconnect(d) => {
                write!(f, "received server initiated disconnect: {}", d.reason_code)
            }
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::KeepAliveTimeout(elapsed) => write!(f, "no pong for {:?}", elapsed),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<TransportError> for ClientError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Closed => ClientError::Closed,
            other => ClientError::Transport(other.to_string()),
        }
    }
}
