//! MQTT v5 packet definitions
//!
//! A client-oriented model of the fifteen control packets. The session
//! engine owns packet identifier assignment, so `packet_id` fields arrive
//! zeroed (or `None` for PUBLISH) from the caller.

use bytes::Bytes;

use super::{PacketType, Properties, QoS, ReasonCode, SubscriptionOptions};

/// MQTT v5 control packet
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::large_enum_variant)]
pub enum Packet {
    Connect(Box<Connect>),
    ConnAck(ConnAck),
    Publish(Publish),
    PubAck(PubAck),
    PubRec(PubRec),
    PubRel(PubRel),
    PubComp(PubComp),
    Subscribe(Subscribe),
    SubAck(SubAck),
    Unsubscribe(Unsubscribe),
    UnsubAck(UnsubAck),
    PingReq,
    PingResp,
    Disconnect(Disconnect),
    Auth(Auth),
}

impl Packet {
    /// Get the control packet type
    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Connect(_) => PacketType::Connect,
            Packet::ConnAck(_) => PacketType::ConnAck,
            Packet::Publish(_) => PacketType::Publish,
            Packet::PubAck(_) => PacketType::PubAck,
            Packet::PubRec(_) => PacketType::PubRec,
            Packet::PubRel(_) => PacketType::PubRel,
            Packet::PubComp(_) => PacketType::PubComp,
            Packet::Subscribe(_) => PacketType::Subscribe,
            Packet::SubAck(_) => PacketType::SubAck,
            Packet::Unsubscribe(_) => PacketType::Unsubscribe,
            Packet::UnsubAck(_) => PacketType::UnsubAck,
            Packet::PingReq => PacketType::PingReq,
            Packet::PingResp => PacketType::PingResp,
            Packet::Disconnect(_) => PacketType::Disconnect,
            Packet::Auth(_) => PacketType::Auth,
        }
    }

    /// The packet identifier carried by this packet, if any
    pub fn packet_id(&self) -> Option<u16> {
        match self {
            Packet::Publish(p) => p.packet_id,
            Packet::PubAck(p) => Some(p.packet_id),
            Packet::PubRec(p) => Some(p.packet_id),
            Packet::PubRel(p) => Some(p.packet_id),
            Packet::PubComp(p) => Some(p.packet_id),
            Packet::Subscribe(p) => Some(p.packet_id),
            Packet::SubAck(p) => Some(p.packet_id),
            Packet::Unsubscribe(p) => Some(p.packet_id),
            Packet::UnsubAck(p) => Some(p.packet_id),
            _ => None,
        }
    }
}

/// CONNECT packet (client -> server)
///
/// The session engine forces `protocol_name` to `"MQTT"` and
/// `protocol_version` to `5` before the packet hits the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connect {
    /// Protocol name, always rewritten to "MQTT"
    pub protocol_name: String,
    /// Protocol level, always rewritten to 5
    pub protocol_version: u8,
    /// Client identifier
    pub client_id: String,
    /// Clean start flag
    pub clean_start: bool,
    /// Keep alive interval in seconds (0 selects the 60s default)
    pub keep_alive: u16,
    /// Username (optional)
    pub username: Option<String>,
    /// Password (optional)
    pub password: Option<Bytes>,
    /// Will message (optional)
    pub will: Option<Will>,
    /// Properties
    pub properties: Properties,
}

impl Default for Connect {
    fn default() -> Self {
        Self {
            protocol_name: "MQTT".to_string(),
            protocol_version: 5,
            client_id: String::new(),
            clean_start: true,
            keep_alive: 0,
            username: None,
            password: None,
            will: None,
            properties: Properties::default(),
        }
    }
}

/// Will message configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Will {
    /// Will topic
    pub topic: String,
    /// Will payload
    pub payload: Bytes,
    /// Will QoS
    pub qos: QoS,
    /// Will retain flag
    pub retain: bool,
    /// Will properties
    pub properties: Properties,
}

/// CONNACK packet (server -> client)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnAck {
    /// Session present flag
    pub session_present: bool,
    /// Reason code
    pub reason_code: ReasonCode,
    /// Properties
    pub properties: Properties,
}

/// PUBLISH packet (bidirectional)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Publish {
    /// Duplicate delivery flag
    pub dup: bool,
    /// Quality of service
    pub qos: QoS,
    /// Retain flag
    pub retain: bool,
    /// Topic name (may be empty when a topic alias is set)
    pub topic: String,
    /// Packet identifier (assigned by the session for QoS > 0)
    pub packet_id: Option<u16>,
    /// Payload
    pub payload: Bytes,
    /// Properties
    pub properties: Properties,
}

/// PUBACK packet (bidirectional, QoS 1)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PubAck {
    /// Packet identifier
    pub packet_id: u16,
    /// Reason code
    pub reason_code: ReasonCode,
    /// Properties
    pub properties: Properties,
}

impl PubAck {
    pub fn new(packet_id: u16) -> Self {
        Self {
            packet_id,
            ..Default::default()
        }
    }
}

/// PUBREC packet (bidirectional, QoS 2 step 1)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PubRec {
    /// Packet identifier
    pub packet_id: u16,
    /// Reason code
    pub reason_code: ReasonCode,
    /// Properties
    pub properties: Properties,
}

impl PubRec {
    pub fn new(packet_id: u16) -> Self {
        Self {
            packet_id,
            ..Default::default()
        }
    }
}

/// PUBREL packet (bidirectional, QoS 2 step 2)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PubRel {
    /// Packet identifier
    pub packet_id: u16,
    /// Reason code
    pub reason_code: ReasonCode,
    /// Properties
    pub properties: Properties,
}

impl PubRel {
    pub fn new(packet_id: u16) -> Self {
        Self {
            packet_id,
            ..Default::default()
        }
    }
}

/// PUBCOMP packet (bidirectional, QoS 2 step 3)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PubComp {
    /// Packet identifier
    pub packet_id: u16,
    /// Reason code
    pub reason_code: ReasonCode,
    /// Properties
    pub properties: Properties,
}

impl PubComp {
    pub fn new(packet_id: u16) -> Self {
        Self {
            packet_id,
            ..Default::default()
        }
    }
}

/// A single SUBSCRIBE entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    /// Topic filter
    pub filter: String,
    /// Subscription options
    pub options: SubscriptionOptions,
}

impl Subscription {
    pub fn new(filter: impl Into<String>, qos: QoS) -> Self {
        Self {
            filter: filter.into(),
            options: SubscriptionOptions {
                qos,
                ..Default::default()
            },
        }
    }
}

/// SUBSCRIBE packet (client -> server)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Subscribe {
    /// Packet identifier (assigned by the session)
    pub packet_id: u16,
    /// Subscriptions
    pub subscriptions: Vec<Subscription>,
    /// Properties
    pub properties: Properties,
}

/// SUBACK packet (server -> client)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubAck {
    /// Packet identifier
    pub packet_id: u16,
    /// Reason code per requested subscription
    pub reason_codes: Vec<ReasonCode>,
    /// Properties
    pub properties: Properties,
}

/// UNSUBSCRIBE packet (client -> server)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Unsubscribe {
    /// Packet identifier (assigned by the session)
    pub packet_id: u16,
    /// Topic filters to unsubscribe from
    pub filters: Vec<String>,
    /// Properties
    pub properties: Properties,
}

/// UNSUBACK packet (server -> client)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UnsubAck {
    /// Packet identifier
    pub packet_id: u16,
    /// Reason code per requested filter
    pub reason_codes: Vec<ReasonCode>,
    /// Properties
    pub properties: Properties,
}

/// DISCONNECT packet (bidirectional)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Disconnect {
    /// Reason code
    pub reason_code: ReasonCode,
    /// Properties
    pub properties: Properties,
}

/// AUTH packet (bidirectional)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Auth {
    /// Reason code
    pub reason_code: ReasonCode,
    /// Properties
    pub properties: Properties,
}

/// Outcome of a QoS 1 or QoS 2 publish, mapped from the terminal ack frame
/// (PUBACK, PUBREC carrying a failure, or PUBCOMP).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishResponse {
    /// Packet type of the terminal frame
    pub packet_type: PacketType,
    /// Reason code of the terminal frame
    pub reason_code: ReasonCode,
    /// Properties of the terminal frame
    pub properties: Properties,
}

impl From<PubAck> for PublishResponse {
    fn from(p: PubAck) -> Self {
        Self {
            packet_type: PacketType::PubAck,
            reason_code: p.reason_code,
            properties: p.properties,
        }
    }
}

impl From<PubRec> for PublishResponse {
    fn from(p: PubRec) -> Self {
        Self {
            packet_type: PacketType::PubRec,
            reason_code: p.reason_code,
            properties: p.properties,
        }
    }
}

impl From<PubComp> for PublishResponse {
    fn from(p: PubComp) -> Self {
        Self {
            packet_type: PacketType::PubComp,
            reason_code: p.reason_code,
            properties: p.properties,
        }
    }
}

/// Outcome of a reauthentication exchange.
///
/// `success` is false when the exchange ended with a server DISCONNECT, in
/// which case the reason code and properties convey the disconnect reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    /// Whether the exchange completed with an AUTH frame
    pub success: bool,
    /// Reason code of the final frame
    pub reason_code: ReasonCode,
    /// Properties of the final frame
    pub properties: Properties,
}

impl From<Auth> for AuthResponse {
    fn from(a: Auth) -> Self {
        Self {
            success: true,
            reason_code: a.reason_code,
            properties: a.properties,
        }
    }
}

impl From<Disconnect> for AuthResponse {
    fn from(d: Disconnect) -> Self {
        Self {
            success: false,
            reason_code: d.reason_code,
            properties: d.properties,
        }
    }
}
