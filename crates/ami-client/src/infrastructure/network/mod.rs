//! Network infrastructure: the manager connection engine.
//!
//! Architecture:
//! - `AmiConnection` owns both halves of the manager stream.
//! - The write half sits behind an async mutex, so concurrent [`AmiConnection::send`]
//!   calls never interleave bytes of different packets on the wire.
//! - The read half is handed to the dispatch loop by [`AmiConnection::start`];
//!   from then on the loop is the only reader.
//! - Parsed messages go through a [`Router`], which runs handlers on their own
//!   tasks.
//! - When the loop dies on a socket failure the connection is marked
//!   unauthorized and the network-error handler (if any) runs exactly once.
//!   A deliberate [`AmiConnection::stop`] closes the socket without reporting
//!   an error.  Closing never queues behind the write mutex: a `closed` watch
//!   flag aborts any send parked in (or waiting for) a write first.

mod reader;

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use ami_core::protocol::headers;
use ami_core::{commands, encode_message, ActionIdGenerator, Message};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::application::dispatch::Router;
use crate::application::registry::Handler;
use reader::{run_dispatch_loop, LoopExit};

/// Errors produced by the connection engine.
#[derive(Debug, Error)]
pub enum AmiNetworkError {
    /// TCP connection to the manager failed.
    #[error("failed to connect to manager at {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },
    /// Writing a packet to the socket failed.
    #[error("write to manager failed: {0}")]
    Write(#[source] io::Error),
    /// Reading from the socket failed.
    #[error("read from manager failed: {0}")]
    Read(#[source] io::Error),
    /// The manager closed the connection.
    #[error("connection closed by manager")]
    Closed,
    /// The socket was already closed by [`AmiConnection::stop`].
    #[error("not connected")]
    NotConnected,
    /// [`AmiConnection::start`] was called a second time.
    #[error("dispatch loop already started")]
    AlreadyStarted,
    /// A request needs a running dispatch loop to see its response.
    #[error("dispatch loop is not running")]
    NotRunning,
    /// No response arrived within the request timeout.
    #[error("no response for ActionID {action_id} before the timeout")]
    Timeout { action_id: String },
    /// The response handler was discarded before a response arrived.
    #[error("response handler for ActionID {action_id} was dropped")]
    ResponseDropped { action_id: String },
    /// The manager rejected the login.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),
}

/// Connection settings for one manager session.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// `host:port` of the manager interface.
    pub address: String,
    /// Login user name.
    pub username: String,
    /// Login secret.
    pub secret: String,
    /// Size of the buffer handed to each socket read.
    pub read_buffer_size: usize,
    /// How long [`AmiConnection::login`] and friends wait for a response.
    pub request_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{}", ami_core::protocol::DEFAULT_AMI_PORT),
            username: "admin".to_string(),
            secret: String::new(),
            read_buffer_size: 1024,
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// Procedure invoked once when the dispatch loop dies on a socket failure.
pub type NetworkErrorHandler = Arc<dyn Fn(&AmiNetworkError) + Send + Sync + 'static>;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A session with a manager interface.
///
/// Constructed behind an `Arc` because the dispatch loop task shares it.
pub struct AmiConnection {
    config: ConnectionConfig,
    reader: Mutex<Option<BoxedReader>>,
    writer: AsyncMutex<Option<BoxedWriter>>,
    router: Router,
    action_ids: ActionIdGenerator,
    authorized: AtomicBool,
    network_error_handler: RwLock<Option<NetworkErrorHandler>>,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
    /// Set once the socket is closed by `stop`; pending sends give up on it.
    closed: watch::Sender<bool>,
}

impl std::fmt::Debug for AmiConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmiConnection")
            .field("address", &self.config.address)
            .field("authorized", &self.is_authorized())
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl AmiConnection {
    /// Opens a TCP connection to `config.address`.
    ///
    /// The dispatch loop is not running yet; register handlers, then call
    /// [`start`](Self::start).
    pub async fn connect(config: ConnectionConfig) -> Result<Arc<Self>, AmiNetworkError> {
        let stream = TcpStream::connect(&config.address)
            .await
            .map_err(|source| AmiNetworkError::ConnectFailed {
                addr: config.address.clone(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("could not set TCP_NODELAY: {e}");
        }
        info!("connected to manager at {}", config.address);
        Ok(Self::from_stream(stream, config))
    }

    /// Wraps an already-established byte stream.
    pub fn from_stream<S>(stream: S, config: ConnectionConfig) -> Arc<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        Arc::new(Self {
            config,
            reader: Mutex::new(Some(Box::new(read_half))),
            writer: AsyncMutex::new(Some(Box::new(write_half))),
            router: Router::new(),
            action_ids: ActionIdGenerator::new(),
            authorized: AtomicBool::new(false),
            network_error_handler: RwLock::new(None),
            shutdown: Mutex::new(None),
            closed: watch::channel(false).0,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The router the dispatch loop feeds.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Returns `true` after a successful [`login`](Self::login) and until the
    /// dispatch loop fails.
    pub fn is_authorized(&self) -> bool {
        self.authorized.load(Ordering::SeqCst)
    }

    /// A fresh `ActionID` unique within this connection.
    pub fn generate_action_id(&self) -> String {
        self.action_ids.generate()
    }

    // ── Handler registration ─────────────────────────────────────────────────

    /// Registers `handler` for responses carrying `action_id`.
    ///
    /// With `retain == false` it fires at most once.  With `retain == true`
    /// it stays registered until [`unregister_action_handler`](Self::unregister_action_handler).
    pub fn register_action_handler<F>(&self, action_id: impl Into<String>, handler: F, retain: bool)
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.router
            .action_handlers()
            .set(action_id, Arc::new(handler), retain);
    }

    pub fn unregister_action_handler(&self, action_id: &str) -> bool {
        self.router.action_handlers().remove(action_id)
    }

    /// Registers `handler` for every event named `event`.
    pub fn register_event_handler<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        self.router.event_handlers().set(event, Arc::new(handler), true);
    }

    pub fn unregister_event_handler(&self, event: &str) -> bool {
        self.router.event_handlers().remove(event)
    }

    /// Installs a handler that sees every inbound message.
    pub fn set_default_handler<F>(&self, handler: F)
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        self.router.set_default_handler(Some(handler));
    }

    pub fn clear_default_handler(&self) {
        self.router.set_default_handler(None);
    }

    /// Installs the procedure run when the dispatch loop dies on a read
    /// failure.
    pub fn set_network_error_handler<F>(&self, handler: F)
    where
        F: Fn(&AmiNetworkError) + Send + Sync + 'static,
    {
        *self
            .network_error_handler
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    // ── Sending ──────────────────────────────────────────────────────────────

    /// Encodes `msg` and writes it to the socket as one packet.
    ///
    /// Returns [`AmiNetworkError::NotConnected`] if the connection is closed
    /// by [`stop`](Self::stop) before or while the packet is being written.
    pub async fn send(&self, msg: &Message) -> Result<(), AmiNetworkError> {
        let bytes = encode_message(msg);
        let mut closed = self.closed.subscribe();

        tokio::select! {
            biased;

            _ = closed.wait_for(|closed| *closed) => {
                return Err(AmiNetworkError::NotConnected);
            }

            result = self.write_packet(&bytes) => result?,
        }

        debug!(
            "sent packet (Action={:?}, ActionID={:?})",
            msg.get(headers::ACTION),
            msg.action_id()
        );
        Ok(())
    }

    async fn write_packet(&self, bytes: &[u8]) -> Result<(), AmiNetworkError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(AmiNetworkError::NotConnected)?;
        writer.write_all(bytes).await.map_err(AmiNetworkError::Write)?;
        writer.flush().await.map_err(AmiNetworkError::Write)
    }

    /// Sends an action and registers `handler` for its response.
    ///
    /// An `ActionID` is generated when `msg` has none.  The handler is
    /// registered before the write so a fast response cannot be missed, and
    /// removed again if the write fails.  Returns the `ActionID` used.
    pub async fn send_action<F>(
        &self,
        mut msg: Message,
        handler: F,
        retain: bool,
    ) -> Result<String, AmiNetworkError>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        let action_id = match msg.action_id() {
            Some(id) => id.to_string(),
            None => {
                let id = self.generate_action_id();
                msg.set(headers::ACTION_ID, id.clone());
                id
            }
        };

        self.register_action_handler(action_id.clone(), handler, retain);
        if let Err(e) = self.send(&msg).await {
            self.unregister_action_handler(&action_id);
            return Err(e);
        }
        Ok(action_id)
    }

    /// Sends an action and waits up to `timeout` for its first response.
    pub async fn request(
        &self,
        msg: Message,
        timeout: Duration,
    ) -> Result<Message, AmiNetworkError> {
        if !self.is_running() {
            return Err(AmiNetworkError::NotRunning);
        }

        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let action_id = self
            .send_action(
                msg,
                move |response| {
                    let sender = tx.lock().unwrap_or_else(PoisonError::into_inner).take();
                    if let Some(sender) = sender {
                        let _ = sender.send(response);
                    }
                },
                false,
            )
            .await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(AmiNetworkError::ResponseDropped { action_id }),
            Err(_) => {
                self.unregister_action_handler(&action_id);
                Err(AmiNetworkError::Timeout { action_id })
            }
        }
    }

    /// Performs the `Login` handshake with the configured credentials.
    ///
    /// Requires a running dispatch loop.  On `Response: Success` the
    /// connection is marked authorized; any other response is an
    /// [`AmiNetworkError::AuthenticationFailed`] carrying the manager's
    /// `Message` header.
    pub async fn login(&self) -> Result<Message, AmiNetworkError> {
        let action = commands::login(&self.config.username, &self.config.secret);
        let response = self.request(action, self.config.request_timeout).await?;

        if response.response() == Some("Success") {
            self.authorized.store(true, Ordering::SeqCst);
            info!("logged in to manager as {}", self.config.username);
            Ok(response)
        } else {
            let reason = response
                .get(headers::MESSAGE)
                .unwrap_or("login rejected")
                .to_string();
            warn!("login as {} rejected: {reason}", self.config.username);
            Err(AmiNetworkError::AuthenticationFailed(reason))
        }
    }

    // ── Dispatch loop lifecycle ──────────────────────────────────────────────

    /// Spawns the dispatch loop.
    ///
    /// The returned handle completes after the loop has stopped and its
    /// cleanup (socket close or error report) has run.
    pub fn start(self: &Arc<Self>) -> Result<JoinHandle<()>, AmiNetworkError> {
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(AmiNetworkError::AlreadyStarted)?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.shutdown.lock().unwrap_or_else(PoisonError::into_inner) = Some(shutdown_tx);

        let this = Arc::clone(self);
        let buffer_size = self.config.read_buffer_size;
        info!("starting dispatch loop");
        Ok(tokio::spawn(async move {
            let exit = run_dispatch_loop(reader, shutdown_rx, &this.router, buffer_size).await;
            this.finish(exit).await;
        }))
    }

    /// Signals the dispatch loop to stop.  Returns `false` if it was not
    /// running.
    pub fn stop(&self) -> bool {
        let sender = self.shutdown.lock().unwrap_or_else(PoisonError::into_inner).take();
        match sender {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    /// Returns `true` while the dispatch loop is reading.
    pub fn is_running(&self) -> bool {
        self.shutdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    async fn finish(&self, exit: LoopExit) {
        match exit {
            LoopExit::Cancelled => {
                // Abort in-flight sends first so the write mutex frees up even
                // when the manager has stopped reading.  The read half is
                // already gone; dropping the write half closes the socket.
                self.closed.send_replace(true);
                drop(self.writer.lock().await.take());
                info!("dispatch loop stopped; connection closed");
            }
            LoopExit::Failed(err) => {
                error!("dispatch loop terminated: {err}");
                self.authorized.store(false, Ordering::SeqCst);
                let handler = self
                    .network_error_handler
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone();
                if let Some(handler) = handler {
                    handler(&err);
                }
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use ami_core::PacketFramer;
    use tokio::io::{AsyncReadExt, DuplexStream};
    use tokio::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(5);

    fn pair() -> (Arc<AmiConnection>, DuplexStream) {
        let (local, peer) = tokio::io::duplex(64 * 1024);
        let config = ConnectionConfig {
            username: "admin".to_string(),
            secret: "s3cret".to_string(),
            request_timeout: Duration::from_secs(2),
            ..ConnectionConfig::default()
        };
        (AmiConnection::from_stream(local, config), peer)
    }

    /// Reads the next packet the connection wrote to `peer`.
    async fn read_packet(peer: &mut DuplexStream, framer: &mut PacketFramer) -> Message {
        loop {
            if let Some(msg) = framer.next_message() {
                return msg;
            }
            let mut buf = [0u8; 1024];
            let n = tokio::time::timeout(WAIT, peer.read(&mut buf))
                .await
                .expect("peer read timed out")
                .expect("peer read failed");
            assert!(n > 0, "connection closed before a full packet arrived");
            framer.extend(&buf[..n]);
        }
    }

    #[tokio::test]
    async fn test_send_writes_encoded_packet() {
        // Arrange
        let (conn, mut peer) = pair();
        let msg = Message::action("Ping").with("ActionID", "t-1");

        // Act
        conn.send(&msg).await.expect("send");

        // Assert
        let mut buf = vec![0u8; 64];
        let n = peer.read(&mut buf).await.expect("read");
        assert_eq!(&buf[..n], b"Action:Ping\r\nActionID:t-1\r\n\r\n");
    }

    #[tokio::test]
    async fn test_concurrent_sends_never_interleave() {
        let (conn, mut peer) = pair();

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let conn = Arc::clone(&conn);
                tokio::spawn(async move {
                    let msg = Message::action("Command")
                        .with("ActionID", format!("t-{i}"))
                        .with("Command", format!("core show channel {i} {}", "x".repeat(200)));
                    conn.send(&msg).await.expect("send");
                })
            })
            .collect();
        for task in tasks {
            task.await.expect("send task panicked");
        }

        let mut framer = PacketFramer::new();
        let mut seen = Vec::new();
        for _ in 0..50 {
            let msg = read_packet(&mut peer, &mut framer).await;
            let id = msg.action_id().expect("ActionID").to_string();
            let index: usize = id.trim_start_matches("t-").parse().expect("index");
            assert_eq!(
                msg.get("Command"),
                Some(format!("core show channel {index} {}", "x".repeat(200)).as_str())
            );
            assert_eq!(msg.len(), 3);
            seen.push(index);
        }
        seen.sort_unstable();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let (conn, _peer) = pair();
        let _loop = conn.start().expect("first start");
        assert!(matches!(conn.start(), Err(AmiNetworkError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_inbound_packets_reach_registered_handlers() {
        // Arrange
        let (conn, mut peer) = pair();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();
        conn.register_event_handler("Hangup", move |msg| {
            let _ = event_tx.send(("event", msg));
        });
        conn.register_action_handler(
            "host-1",
            move |msg| {
                let _ = tx.send(("action", msg));
            },
            false,
        );
        let _loop = conn.start().expect("start");

        // Act
        peer.write_all(b"Response: Success\r\nActionID: host-1\r\n\r\nEvent: Hangup\r\nChannel: SIP/100\r\n\r\n")
            .await
            .expect("write");

        // Assert
        let mut kinds = Vec::new();
        for _ in 0..2 {
            let (kind, _msg) = tokio::time::timeout(WAIT, rx.recv())
                .await
                .expect("handler not invoked")
                .expect("channel closed");
            kinds.push(kind);
        }
        kinds.sort_unstable();
        assert_eq!(kinds, vec!["action", "event"]);
        assert!(!conn.router().action_handlers().contains("host-1"));
        assert!(conn.router().event_handlers().contains("Hangup"));
    }

    #[tokio::test]
    async fn test_peer_close_reports_network_error_once() {
        // Arrange
        let (conn, peer) = pair();
        conn.authorized.store(true, Ordering::SeqCst);
        let calls = Arc::new(AtomicUsize::new(0));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let c = Arc::clone(&calls);
        conn.set_network_error_handler(move |err| {
            c.fetch_add(1, Ordering::SeqCst);
            let _ = tx.send(matches!(err, AmiNetworkError::Closed));
        });
        let handle = conn.start().expect("start");

        // Act
        drop(peer);
        tokio::time::timeout(WAIT, handle)
            .await
            .expect("loop did not end")
            .expect("loop task panicked");

        // Assert
        assert_eq!(rx.recv().await, Some(true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!conn.is_authorized());
        assert!(!conn.is_running());
    }

    #[tokio::test]
    async fn test_stop_closes_socket_without_error_report() {
        // Arrange
        let (conn, mut peer) = pair();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        conn.set_network_error_handler(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let handle = conn.start().expect("start");
        assert!(conn.is_running());

        // Act
        assert!(conn.stop());
        tokio::time::timeout(WAIT, handle)
            .await
            .expect("loop did not stop")
            .expect("loop task panicked");

        // Assert – both halves are gone, so the peer sees EOF
        let mut buf = [0u8; 8];
        let n = tokio::time::timeout(WAIT, peer.read(&mut buf))
            .await
            .expect("peer read timed out")
            .expect("peer read failed");
        assert_eq!(n, 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(matches!(
            conn.send(&Message::action("Ping")).await,
            Err(AmiNetworkError::NotConnected)
        ));
        assert!(!conn.stop(), "second stop is a no-op");
    }

    #[tokio::test]
    async fn test_stop_is_not_blocked_by_stalled_write() {
        // Arrange – a tiny pipe whose far end never reads
        let (local, _peer) = tokio::io::duplex(64);
        let conn = AmiConnection::from_stream(local, ConnectionConfig::default());
        let handle = conn.start().expect("start");
        let sender = {
            let conn = Arc::clone(&conn);
            tokio::spawn(async move {
                let msg = Message::action("Command").with("Command", "x".repeat(4096));
                conn.send(&msg).await
            })
        };
        // Let the send fill the pipe and park inside the write.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!sender.is_finished(), "write should be stalled");

        // Act
        assert!(conn.stop());
        tokio::time::timeout(WAIT, handle)
            .await
            .expect("dispatch loop did not finish behind a stalled write")
            .expect("loop task panicked");

        // Assert
        let result = tokio::time::timeout(WAIT, sender)
            .await
            .expect("stalled send was not aborted")
            .expect("send task panicked");
        assert!(matches!(result, Err(AmiNetworkError::NotConnected)));
        assert!(matches!(
            conn.send(&Message::action("Ping")).await,
            Err(AmiNetworkError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_send_action_assigns_action_id() {
        let (conn, mut peer) = pair();

        let id = conn
            .send_action(Message::action("Ping"), |_msg| {}, false)
            .await
            .expect("send_action");

        let mut framer = PacketFramer::new();
        let written = read_packet(&mut peer, &mut framer).await;
        assert_eq!(written.action_id(), Some(id.as_str()));
        assert!(id.ends_with("-1"));
        assert!(conn.router().action_handlers().contains(&id));
    }

    #[tokio::test]
    async fn test_send_action_keeps_caller_action_id() {
        let (conn, mut peer) = pair();

        let id = conn
            .send_action(Message::action("Ping").with("ActionID", "mine-7"), |_msg| {}, true)
            .await
            .expect("send_action");

        let mut framer = PacketFramer::new();
        assert_eq!(id, "mine-7");
        assert_eq!(read_packet(&mut peer, &mut framer).await.action_id(), Some("mine-7"));
    }

    #[tokio::test]
    async fn test_send_action_failure_unregisters_handler() {
        let (conn, _peer) = pair();
        let handle = conn.start().expect("start");
        conn.stop();
        handle.await.expect("loop task panicked");

        let result = conn
            .send_action(Message::action("Ping").with("ActionID", "gone-1"), |_msg| {}, false)
            .await;

        assert!(matches!(result, Err(AmiNetworkError::NotConnected)));
        assert!(!conn.router().action_handlers().contains("gone-1"));
    }

    #[tokio::test]
    async fn test_login_success_marks_authorized() {
        // Arrange
        let (conn, mut peer) = pair();
        let _loop = conn.start().expect("start");
        let server = tokio::spawn(async move {
            let mut framer = PacketFramer::new();
            let login = read_packet(&mut peer, &mut framer).await;
            assert_eq!(login.get("Action"), Some("Login"));
            assert_eq!(login.get("Username"), Some("admin"));
            assert_eq!(login.get("Secret"), Some("s3cret"));
            let reply = format!(
                "Response: Success\r\nActionID: {}\r\nMessage: Authentication accepted\r\n\r\n",
                login.action_id().expect("ActionID")
            );
            peer.write_all(reply.as_bytes()).await.expect("reply");
            peer
        });

        // Act
        let response = conn.login().await.expect("login");

        // Assert
        assert_eq!(response.get("Message"), Some("Authentication accepted"));
        assert!(conn.is_authorized());
        let _peer = server.await.expect("server task panicked");
    }

    #[tokio::test]
    async fn test_login_rejection_reports_manager_message() {
        let (conn, mut peer) = pair();
        let _loop = conn.start().expect("start");
        let server = tokio::spawn(async move {
            let mut framer = PacketFramer::new();
            let login = read_packet(&mut peer, &mut framer).await;
            let reply = format!(
                "Response: Error\r\nActionID: {}\r\nMessage: Authentication failed\r\n\r\n",
                login.action_id().expect("ActionID")
            );
            peer.write_all(reply.as_bytes()).await.expect("reply");
            peer
        });

        let result = conn.login().await;

        match result {
            Err(AmiNetworkError::AuthenticationFailed(reason)) => {
                assert_eq!(reason, "Authentication failed")
            }
            other => panic!("unexpected login result: {other:?}"),
        }
        assert!(!conn.is_authorized());
        let _peer = server.await.expect("server task panicked");
    }

    #[tokio::test]
    async fn test_request_without_dispatch_loop_is_rejected() {
        let (conn, _peer) = pair();
        let result = conn.request(Message::action("Ping"), WAIT).await;
        assert!(matches!(result, Err(AmiNetworkError::NotRunning)));
    }

    #[tokio::test]
    async fn test_request_timeout_removes_handler() {
        // Arrange – the peer reads nothing and never answers
        let (conn, _peer) = pair();
        let _loop = conn.start().expect("start");

        // Act
        let result = conn
            .request(
                Message::action("Ping").with("ActionID", "slow-1"),
                Duration::from_millis(50),
            )
            .await;

        // Assert
        match result {
            Err(AmiNetworkError::Timeout { action_id }) => assert_eq!(action_id, "slow-1"),
            other => panic!("unexpected request result: {other:?}"),
        }
        assert!(!conn.router().action_handlers().contains("slow-1"));
    }

    #[tokio::test]
    async fn test_unregister_handlers() {
        let (conn, _peer) = pair();
        conn.register_action_handler("a-1", |_msg| {}, true);
        conn.register_event_handler("Hangup", |_msg| {});

        assert!(conn.unregister_action_handler("a-1"));
        assert!(!conn.unregister_action_handler("a-1"));
        assert!(conn.unregister_event_handler("Hangup"));
        assert!(!conn.unregister_event_handler("Hangup"));
    }

    #[tokio::test]
    async fn test_generated_action_ids_are_unique() {
        let (conn, _peer) = pair();
        let first = conn.generate_action_id();
        let second = conn.generate_action_id();
        assert_ne!(first, second);
        assert!(first.ends_with("-1"));
        assert!(second.ends_with("-2"));
    }

    #[test]
    fn test_default_config_targets_local_manager() {
        let config = ConnectionConfig::default();
        assert_eq!(config.address, "127.0.0.1:5038");
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }
}
