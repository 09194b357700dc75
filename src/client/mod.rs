//! MQTT v5 client session engine
//!
//! A [`Client`] drives one MQTT session over a caller-supplied packet
//! connection. Three tasks run per session once connected: the writer (sole
//! owner of the connection's write half), the reader (sole owner of the
//! read half), and the pinger. Caller operations correlate with server
//! responses through the [`MidService`](crate::mids::MidService) and are
//! bounded by the configured packet timeout.

mod auth;
mod pinger;
mod publish;
mod reader;
mod signal;
mod subscribe;
mod writer;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, OnceCell};
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::debug;

use crate::error::ClientError;
use crate::flow::InflightGate;
use crate::hooks::{AuthHandler, DefaultTrace, Trace};
use crate::mids::{MidService, StandardMids};
use crate::persistence::{NoopPersistence, Persistence};
use crate::protocol::{ConnAck, Connect, Disconnect, Packet};
use crate::router::{Router, StandardRouter};
use crate::transport::PacketConn;

use self::signal::Signal;

/// Keepalive applied when the CONNECT packet asks for none
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(60);
/// Default bound on every request/response exchange
pub const DEFAULT_PACKET_TIMEOUT: Duration = Duration::from_secs(10);
/// Default bound on the graceful shutdown handshake
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Callback invoked once after teardown of a successfully connected session
pub type OnClose = Box<dyn FnOnce() + Send>;

/// User-configurable options for a [`Client`].
///
/// Only `conn` is required; defaults cover everything else.
pub struct ClientConfig {
    /// Packet connection over an already-established stream
    pub conn: Option<Box<dyn PacketConn>>,
    /// Packet identifier allocator
    pub mids: Option<Arc<dyn MidService>>,
    /// Dispatcher for inbound publications
    pub router: Option<Arc<dyn Router>>,
    /// Enhanced-authentication handler
    pub auth_handler: Option<Arc<dyn AuthHandler>>,
    /// In-flight packet storage
    pub persistence: Option<Arc<dyn Persistence>>,
    /// Bound on request/response exchanges
    pub packet_timeout: Duration,
    /// Bound on the graceful shutdown handshake
    pub shutdown_timeout: Duration,
    /// Observability callbacks
    pub trace: Option<Arc<dyn Trace>>,
    /// Invoked once after teardown, only if the handshake succeeded
    pub on_close: Option<OnClose>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            conn: None,
            mids: None,
            router: None,
            auth_handler: None,
            persistence: None,
            packet_timeout: DEFAULT_PACKET_TIMEOUT,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
            trace: None,
            on_close: None,
        }
    }
}

impl ClientConfig {
    pub fn new(conn: impl PacketConn + 'static) -> Self {
        Self {
            conn: Some(Box::new(conn)),
            ..Default::default()
        }
    }
}

/// Communication properties negotiated during the handshake.
///
/// Held twice per session: the server's view (overwritten from CONNACK
/// properties) and the client's own (taken from the CONNECT packet). Both
/// are immutable once the handshake completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommsProperties {
    pub maximum_packet_size: u32,
    pub receive_maximum: u16,
    pub topic_alias_maximum: u16,
    pub maximum_qos: u8,
    pub retain_available: bool,
    pub wildcard_sub_available: bool,
    pub sub_id_available: bool,
    pub shared_sub_available: bool,
}

impl Default for CommsProperties {
    fn default() -> Self {
        Self {
            maximum_packet_size: 0,
            receive_maximum: 65535,
            topic_alias_maximum: 0,
            maximum_qos: 2,
            retain_available: true,
            wildcard_sub_available: true,
            sub_id_available: true,
            shared_sub_available: true,
        }
    }
}

/// Handle to one MQTT v5 session. Cheap to clone; all clones share the
/// session.
#[derive(Clone)]
pub struct Client {
    pub(crate) core: Arc<ClientCore>,
}

/// Resources handed to the session loops exactly once, at connect time.
struct Boot {
    conn: Option<Box<dyn PacketConn>>,
    writeq_rx: mpsc::Receiver<Packet>,
    pong_rx: mpsc::Receiver<()>,
}

/// Mutable session state guarded by the session mutex
struct SessionState {
    closed: bool,
    /// Response slot of the reauthentication exchange in progress, if any
    reauth: Option<mpsc::Sender<Packet>>,
}

pub(crate) struct ClientCore {
    pub(crate) mids: Arc<dyn MidService>,
    pub(crate) router: Arc<dyn Router>,
    pub(crate) auth_handler: Option<Arc<dyn AuthHandler>>,
    pub(crate) persistence: Arc<dyn Persistence>,
    pub(crate) packet_timeout: Duration,
    shutdown_timeout: Duration,
    pub(crate) trace: Arc<dyn Trace>,

    boot: Mutex<Option<Boot>>,
    writeq: mpsc::Sender<Packet>,
    pub(crate) pong_tx: mpsc::Sender<()>,
    /// Handshake result slot; populated by the reader on CONNACK
    pub(crate) connack_tx: Mutex<Option<mpsc::Sender<ConnAck>>>,
    handshake: OnceCell<Result<ConnAck, ClientError>>,
    state: Mutex<SessionState>,
    pub(crate) server_props: RwLock<CommsProperties>,
    pub(crate) client_props: RwLock<CommsProperties>,
    pub(crate) server_inflight: RwLock<Option<InflightGate>>,
    /// The client's own window. Inbound publications are acked by the
    /// reader directly, so nothing draws on this gate yet.
    #[allow(dead_code)]
    pub(crate) client_inflight: RwLock<Option<InflightGate>>,
    on_close: Mutex<Option<OnClose>>,

    pub(crate) exit: Signal,
    done: Signal,
    pub(crate) writer_done: Signal,
    pub(crate) reader_done: Signal,
    pub(crate) pinger_done: Signal,
    pub(crate) writer_started: AtomicBool,
    pub(crate) reader_started: AtomicBool,
    pub(crate) pinger_started: AtomicBool,
}

impl Client {
    /// Create a client from its configuration. The connection must already
    /// be established; nothing runs until [`connect`](Self::connect).
    pub fn new(config: ClientConfig) -> Self {
        let (writeq_tx, writeq_rx) = mpsc::channel(1);
        let (pong_tx, pong_rx) = mpsc::channel(1);

        let core = ClientCore {
            mids: config
                .mids
                .unwrap_or_else(|| Arc::new(StandardMids::new())),
            router: config
                .router
                .unwrap_or_else(|| Arc::new(StandardRouter::new())),
            auth_handler: config.auth_handler,
            persistence: config
                .persistence
                .unwrap_or_else(|| Arc::new(NoopPersistence)),
            packet_timeout: config.packet_timeout,
            shutdown_timeout: config.shutdown_timeout,
            trace: config.trace.unwrap_or_else(|| Arc::new(DefaultTrace)),
            boot: Mutex::new(Some(Boot {
                conn: config.conn,
                writeq_rx,
                pong_rx,
            })),
            writeq: writeq_tx,
            pong_tx,
            connack_tx: Mutex::new(None),
            handshake: OnceCell::new(),
            state: Mutex::new(SessionState {
                closed: false,
                reauth: None,
            }),
            server_props: RwLock::new(CommsProperties::default()),
            client_props: RwLock::new(CommsProperties::default()),
            server_inflight: RwLock::new(None),
            client_inflight: RwLock::new(None),
            on_close: Mutex::new(config.on_close),
            exit: Signal::new(),
            done: Signal::new(),
            writer_done: Signal::new(),
            reader_done: Signal::new(),
            pinger_done: Signal::new(),
            writer_started: AtomicBool::new(false),
            reader_started: AtomicBool::new(false),
            pinger_started: AtomicBool::new(false),
        };

        Self {
            core: Arc::new(core),
        }
    }

    /// Establish the MQTT session over the configured connection.
    ///
    /// Callable at most once: concurrent and repeated calls observe the
    /// memoized outcome of the first. On a CONNACK carrying a failure code
    /// the returned [`ClientError::ConnectRejected`] carries the parsed
    /// packet. Any handshake failure tears the session down.
    pub async fn connect(&self, connect: Connect) -> Result<ConnAck, ClientError> {
        if self.core.handshake.get().is_none() {
            let missing = self
                .core
                .boot
                .lock()
                .as_ref()
                .map_or(false, |boot| boot.conn.is_none());
            if missing {
                return Err(ClientError::MissingConnection);
            }
        }

        let core = self.core.clone();
        self.core
            .handshake
            .get_or_init(|| async move {
                let outcome = core.do_handshake(connect).await;
                if outcome.is_err() {
                    core.close();
                }
                outcome
            })
            .await
            .clone()
    }

    /// Whether the session is connected and not torn down.
    ///
    /// Panics if [`connect`](Self::connect) was never called.
    pub fn is_alive(&self) -> bool {
        self.core.assert_connected();
        !self.core.state.lock().closed
    }

    /// Wait until the session has fully torn down.
    ///
    /// Panics if [`connect`](Self::connect) was never called.
    pub async fn done(&self) {
        self.core.assert_connected();
        self.core.done.wait().await;
    }

    /// The server's negotiated view of the communication properties.
    pub fn server_properties(&self) -> CommsProperties {
        *self.core.server_props.read()
    }

    /// The client's own declared communication properties.
    pub fn client_properties(&self) -> CommsProperties {
        *self.core.client_props.read()
    }

    /// The router dispatching inbound publications for this session.
    pub fn router(&self) -> Arc<dyn Router> {
        self.core.router.clone()
    }

    /// Fire-and-forget DISCONNECT. The session is not torn down; callers
    /// typically follow with [`close`](Self::close).
    pub async fn disconnect(&self, disconnect: Disconnect) -> Result<(), ClientError> {
        self.core.assert_connected();
        self.core.write(Packet::Disconnect(disconnect)).await
    }

    /// Graceful teardown: best-effort DISCONNECT, wait for the reader to
    /// drain (bounded by the shutdown timeout), then close.
    pub async fn shutdown(&self) {
        self.core.assert_connected();
        if self
            .core
            .write(Packet::Disconnect(Disconnect::default()))
            .await
            .is_ok()
        {
            tokio::select! {
                _ = self.core.reader_done.wait() => {}
                _ = tokio::time::sleep(self.core.shutdown_timeout) => {}
            }
        }
        self.close().await;
    }

    /// Tear the session down and wait for every loop to stop. Idempotent.
    pub async fn close(&self) {
        self.core.assert_connected();
        self.core.close();
        self.core.done.wait().await;
    }
}

impl ClientCore {
    /// Connect-once body: property negotiation, loop startup, CONNECT /
    /// CONNACK exchange, gate construction.
    async fn do_handshake(
        self: &Arc<Self>,
        mut connect: Connect,
    ) -> Result<ConnAck, ClientError> {
        let boot = self.boot.lock().take().ok_or(ClientError::Closed)?;
        let conn = boot.conn.ok_or(ClientError::MissingConnection)?;
        let (sink, source) = conn.split();

        let mut keepalive = if connect.keep_alive == 0 {
            DEFAULT_KEEP_ALIVE
        } else {
            Duration::from_secs(connect.keep_alive as u64)
        };

        {
            let mut props = self.client_props.write();
            let p = &connect.properties;
            if let Some(v) = p.maximum_packet_size {
                props.maximum_packet_size = v;
            }
            if let Some(v) = p.maximum_qos {
                props.maximum_qos = v;
            }
            if let Some(v) = p.receive_maximum {
                props.receive_maximum = v;
            }
            if let Some(v) = p.topic_alias_maximum {
                props.topic_alias_maximum = v;
            }
        }

        self.spawn_writer(sink, boot.writeq_rx);
        self.spawn_reader(source);

        let deadline = Instant::now() + self.packet_timeout;
        let (ca_tx, mut ca_rx) = mpsc::channel(1);
        *self.connack_tx.lock() = Some(ca_tx);

        connect.protocol_name = "MQTT".to_string();
        connect.protocol_version = 5;

        match timeout_at(deadline, self.write(Packet::Connect(Box::new(connect)))).await {
            Ok(result) => result?,
            Err(_) => return Err(ClientError::Timeout),
        }

        let connack = tokio::select! {
            biased;
            received = ca_rx.recv() => received.ok_or(ClientError::Closed)?,
            _ = self.exit.wait() => return Err(ClientError::Closed),
            _ = sleep_until(deadline) => return Err(ClientError::Timeout),
        };
        *self.connack_tx.lock() = None;

        if connack.reason_code.is_failure() {
            let reason = connack
                .properties
                .reason_string
                .clone()
                .unwrap_or_else(|| connack.reason_code.to_string());
            return Err(ClientError::ConnectRejected { connack, reason });
        }

        {
            let mut props = self.server_props.write();
            let p = &connack.properties;
            if let Some(v) = p.server_keep_alive {
                keepalive = Duration::from_secs(v as u64);
            }
            if let Some(v) = p.receive_maximum {
                props.receive_maximum = v;
            }
            if let Some(v) = p.maximum_qos {
                props.maximum_qos = v;
            }
            if let Some(v) = p.maximum_packet_size {
                props.maximum_packet_size = v;
            }
            if let Some(v) = p.topic_alias_maximum {
                props.topic_alias_maximum = v;
            }
            if let Some(v) = p.retain_available {
                props.retain_available = v != 0;
            }
            if let Some(v) = p.wildcard_subscription_available {
                props.wildcard_sub_available = v != 0;
            }
            if let Some(v) = p.subscription_identifier_available {
                props.sub_id_available = v != 0;
            }
            if let Some(v) = p.shared_subscription_available {
                props.shared_sub_available = v != 0;
            }
        }

        *self.server_inflight.write() =
            Some(InflightGate::new(self.server_props.read().receive_maximum));
        *self.client_inflight.write() =
            Some(InflightGate::new(self.client_props.read().receive_maximum));

        self.spawn_pinger(boot.pong_rx, keepalive);

        Ok(connack)
    }

    /// Whether the initial handshake reached a successful CONNACK.
    fn handshake_succeeded(&self) -> bool {
        matches!(self.handshake.get(), Some(Ok(_)))
    }

    /// Programmer-error assertion: every post-handshake operation requires
    /// a prior connect call. Violations abort rather than error.
    pub(crate) fn assert_connected(&self) {
        assert!(
            self.handshake.initialized(),
            "method called on a client without a connect() call"
        );
    }

    /// Hand a packet to the writer task, racing session teardown.
    pub(crate) async fn write(&self, packet: Packet) -> Result<(), ClientError> {
        self.trace.on_send(&packet);
        tokio::select! {
            _ = self.exit.wait() => Err(ClientError::Closed),
            sent = self.writeq.send(packet) => sent.map_err(|_| ClientError::Closed),
        }
    }

    /// Wait for the response to an in-flight request. The delivered packet
    /// wins over a concurrent teardown.
    pub(crate) async fn await_response(
        &self,
        rx: &mut mpsc::Receiver<Packet>,
        deadline: Instant,
    ) -> Result<Packet, ClientError> {
        tokio::select! {
            biased;
            received = rx.recv() => received.ok_or(ClientError::Closed),
            _ = self.exit.wait() => Err(ClientError::Closed),
            _ = sleep_until(deadline) => Err(ClientError::Timeout),
        }
    }

    /// Terminal failure: record it and tear the session down.
    pub(crate) fn fail(self: &Arc<Self>, error: ClientError) {
        debug!(%error, "client failed");
        self.trace.on_error(&error);
        self.close();
    }

    /// Begin teardown. Idempotent; the close sequence runs on its own task
    /// so that callers inside the session loops never deadlock on
    /// themselves.
    pub(crate) fn close(self: &Arc<Self>) {
        {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        let core = self.clone();
        tokio::spawn(async move {
            debug!("closing");
            core.exit.set();
            if core.writer_started.load(Ordering::Acquire) {
                core.writer_done.wait().await;
            }
            if core.pinger_started.load(Ordering::Acquire) {
                core.pinger_done.wait().await;
            }
            if core.reader_started.load(Ordering::Acquire) {
                core.reader_done.wait().await;
            }
            core.done.set();
            if core.handshake_succeeded() {
                if let Some(on_close) = core.on_close.lock().take() {
                    on_close();
                }
            }
        });
    }

    /// Take the reauthentication slot, failing if an exchange is pending.
    pub(crate) fn begin_reauth(
        &self,
        tx: mpsc::Sender<Packet>,
    ) -> Result<(), ClientError> {
        let mut state = self.state.lock();
        if state.reauth.is_some() {
            return Err(ClientError::AuthInProgress);
        }
        state.reauth = Some(tx);
        Ok(())
    }

    pub(crate) fn end_reauth(&self) {
        self.state.lock().reauth = None;
    }

    /// Clone of the active reauthentication slot, if any.
    pub(crate) fn reauth_slot(&self) -> Option<mpsc::Sender<Packet>> {
        self.state.lock().reauth.clone()
    }
}
