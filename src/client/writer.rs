//! Writer loop
//!
//! Sole owner of the connection's write half. Packets reach the stream in
//! exactly the order the rendezvous queue accepts them, which removes any
//! need for stream-level locking.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::ClientError;
use crate::protocol::Packet;
use crate::transport::PacketSink;

use super::ClientCore;

impl ClientCore {
    pub(crate) fn spawn_writer(
        self: &Arc<Self>,
        sink: Box<dyn PacketSink>,
        writeq: mpsc::Receiver<Packet>,
    ) {
        self.writer_started.store(true, Ordering::Release);
        let core = self.clone();
        tokio::spawn(async move { core.writer(sink, writeq).await });
    }

    async fn writer(
        self: Arc<Self>,
        mut sink: Box<dyn PacketSink>,
        mut writeq: mpsc::Receiver<Packet>,
    ) {
        loop {
            let packet = tokio::select! {
                _ = self.exit.wait() => break,
                queued = writeq.recv() => match queued {
                    Some(packet) => packet,
                    None => break,
                },
            };
            if let Err(e) = sink.write_packet(&packet).await {
                self.fail(ClientError::Transport(format!("write packet error: {}", e)));
                break;
            }
        }
        debug!("writer stopped");
        self.writer_done.set();
    }
}
