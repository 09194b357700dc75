//! Pinger loop
//!
//! Emits PINGREQ at the negotiated keepalive interval and fails the
//! session when a pong stays outstanding for twice that interval. Pong
//! signalling is non-blocking on both sides so that shutdown never orders
//! the pinger against the reader.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::debug;

use crate::error::ClientError;
use crate::protocol::Packet;

use super::ClientCore;

impl ClientCore {
    pub(crate) fn spawn_pinger(
        self: &Arc<Self>,
        pong: mpsc::Receiver<()>,
        keepalive: Duration,
    ) {
        self.pinger_started.store(true, Ordering::Release);
        let core = self.clone();
        tokio::spawn(async move { core.pinger(pong, keepalive).await });
    }

    async fn pinger(self: Arc<Self>, mut pong: mpsc::Receiver<()>, keepalive: Duration) {
        // Oldest unanswered ping; cleared on pong.
        let mut last_ping: Option<Instant> = None;
        let timer = tokio::time::sleep(keepalive);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = self.exit.wait() => break,

                received = pong.recv() => {
                    if received.is_none() {
                        // Pong slot gone; teardown is already under way.
                        self.exit.wait().await;
                        break;
                    }
                    last_ping = None;
                }

                _ = &mut timer => {
                    let now = Instant::now();
                    if let Some(outstanding) = last_ping.map(|t| now.duration_since(t)) {
                        if outstanding >= keepalive * 2 {
                            self.fail(ClientError::KeepAliveTimeout(outstanding));
                            break;
                        }
                    }
                    if self.write(Packet::PingReq).await.is_ok() && last_ping.is_none() {
                        last_ping = Some(now);
                    }
                    timer.as_mut().reset(now + keepalive);
                }
            }
        }
        debug!("pinger stopped");
        self.pinger_done.set();
    }
}
