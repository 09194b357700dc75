//! Reauthentication path
//!
//! Writes the initial AUTH and waits for the exchange to settle. The
//! reader loop drives any intermediate continue-authentication frames
//! through the configured handler; only the final AUTH or a server
//! DISCONNECT reaches the caller.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ClientError;
use crate::protocol::{Auth, AuthResponse, Packet, PacketType};

use super::{Client, ClientCore};

/// Clears the reauthentication slot however the exchange ends, including
/// caller cancellation.
struct ReauthGuard<'a> {
    core: &'a Arc<ClientCore>,
}

impl Drop for ReauthGuard<'_> {
    fn drop(&mut self) {
        self.core.end_reauth();
    }
}

impl Client {
    /// Initiate a reauthentication exchange with the server.
    ///
    /// At most one exchange may be in flight; overlapping attempts fail
    /// with [`ClientError::AuthInProgress`] without touching the wire.
    ///
    /// Panics if [`connect`](Self::connect) was never called.
    pub async fn authenticate(&self, auth: Auth) -> Result<AuthResponse, ClientError> {
        let core = &self.core;
        core.assert_connected();
        debug!("client initiated reauthentication");

        let (tx, mut rx) = mpsc::channel(1);
        core.begin_reauth(tx)?;
        let _guard = ReauthGuard { core };

        let deadline = Instant::now() + core.packet_timeout;
        core.write(Packet::Auth(auth)).await?;

        match core.await_response(&mut rx, deadline).await? {
            // An AUTH here is conclusive; the only way the server aborts a
            // reauth is a DISCONNECT.
            Packet::Auth(auth) => Ok(AuthResponse::from(auth)),
            Packet::Disconnect(disconnect) => Ok(AuthResponse::from(disconnect)),
            other => Err(ClientError::UnexpectedPacket {
                expected: PacketType::Auth,
                got: other.packet_type(),
            }),
        }
    }
}
