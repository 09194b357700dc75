//! Extensibility hooks
//!
//! Optional collaborators the session invokes at well-defined points:
//! the enhanced-authentication handler and the observability trace.

use async_trait::async_trait;

use crate::error::ClientError;
use crate::protocol::{Auth, Packet, Publish};

/// Drives the enhanced-authentication exchange.
///
/// The reader loop calls `authenticate` for every server AUTH carrying
/// reason 0x18 (continue authentication) and writes the returned packet
/// back; `authenticated` is notified once the exchange settles.
#[async_trait]
pub trait AuthHandler: Send + Sync {
    /// Produce the next AUTH packet for a continue-authentication request.
    async fn authenticate(&self, auth: Auth) -> Auth;

    /// Called when the server reports the exchange as successful.
    async fn authenticated(&self) {}
}

/// Observability callbacks, all optional.
///
/// Methods are invoked inline on the session's hot paths and must not
/// block.
pub trait Trace: Send + Sync {
    /// A packet was handed to the writer queue.
    fn on_send(&self, _packet: &Packet) {}

    /// A packet was parsed off the stream.
    fn on_recv(&self, _packet: &Packet) {}

    /// An outbound publication entered the publish path.
    fn on_publish(&self, _publish: &Publish) {}

    /// The session failed terminally.
    fn on_error(&self, _error: &ClientError) {}
}

/// Trace implementation that records nothing
#[derive(Debug, Default)]
pub struct DefaultTrace;

impl Trace for DefaultTrace {}
