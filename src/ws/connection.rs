#![expect(
    clippy::module_name_repetitions,
    reason = "Connection types expose their domain in the name for clarity"
)]

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures::stream::SplitSink;
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::handshake::client::Request as HandshakeRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use super::config::Config;
use super::correlator::{Correlator, PendingWait};
use super::error::WsError;
use super::events::{CloseEvent, DebugEvent, Events};
use super::heartbeat::HeartbeatScheduler;
use super::session::{Action, CloseCode, Session, SessionMachine};
use super::traits::MessageCodec;
use crate::auth::Identity;
use crate::error::{Error, Kind};
use crate::Result;
use crate::types::{Heartbeat, Request, Response, ResponseId};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Resume hint header carrying the session identifier.
pub const SESSION_ID_HEADER: &str = "x-session-id";
/// Resume hint header carrying the sequence number.
pub const SEQUENCE_HEADER: &str = "x-sequence";

/// Connection state tracking.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started yet
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Socket is open
    Connected {
        /// When the connection was established
        since: Instant,
    },
    /// Closed with a recoverable code, about to connect again
    Reconnecting {
        /// Current reconnection attempt number
        attempt: u32,
    },
    /// Stopped for good: fatal close, user close, or reconnection disabled
    Terminated,
}

impl ConnectionState {
    /// Check if the connection is currently active.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    #[must_use]
    pub const fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// A frame waiting to be written, with the channel that reports whether the write succeeded.
struct Outbound {
    frame: Vec<u8>,
    ack: oneshot::Sender<bool>,
}

/// Why a single connection ended.
enum ConnectionEnd {
    /// The client was closed by its owner
    Shutdown,
    /// The socket closed, with the server's code if it sent one
    Closed { code: Option<u16>, reason: String },
}

impl ConnectionEnd {
    fn dropped<E: std::fmt::Display>(error: &E) -> Self {
        Self::Closed {
            code: None,
            reason: error.to_string(),
        }
    }
}

/// Owns the socket and the session state machine.
///
/// All session state lives in a single background task that handles inbound frames,
/// outbound requests, heartbeat ticks and close events one at a time. Other components see
/// the session through watch snapshots and talk to the task through channels.
pub struct ConnectionManager {
    config: Config,
    codec: Arc<dyn MessageCodec>,
    /// Watch channel sender for state changes (enables reconnection detection)
    state_tx: watch::Sender<ConnectionState>,
    /// Held for the manager's lifetime so state updates are stored even with no subscribers
    state_rx: watch::Receiver<ConnectionState>,
    /// Latest session snapshot published by the connection task
    session_rx: watch::Receiver<Session>,
    /// Sender channel for outgoing frames
    sender_tx: mpsc::UnboundedSender<Outbound>,
    events: Arc<Events>,
    correlator: Arc<Correlator>,
    shutdown: CancellationToken,
    /// The connection task, until it is started
    driver: Mutex<Option<Driver>>,
    /// The running connection task, until its outcome is collected
    task: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl ConnectionManager {
    /// Create a connection manager. Nothing connects until [`ConnectionManager::start`].
    pub fn new(identity: Identity, config: Config, codec: Arc<dyn MessageCodec>) -> Self {
        let (sender_tx, sender_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (session_tx, session_rx) = watch::channel(Session::default());
        let events = Arc::new(Events::new(config.event_capacity));
        let correlator = Arc::new(Correlator::new());
        let shutdown = CancellationToken::new();

        let driver = Driver {
            config: config.clone(),
            codec: Arc::clone(&codec),
            machine: SessionMachine::new(identity),
            sender_rx,
            state_tx: state_tx.clone(),
            session_tx,
            events: Arc::clone(&events),
            correlator: Arc::clone(&correlator),
            shutdown: shutdown.clone(),
        };

        Self {
            config,
            codec,
            state_tx,
            state_rx,
            session_rx,
            sender_tx,
            events,
            correlator,
            shutdown,
            driver: Mutex::new(Some(driver)),
            task: Mutex::new(None),
        }
    }

    /// Spawn the connection task. Returns `false` if it was already started.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self) -> bool {
        let Some(driver) = self
            .driver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return false;
        };

        let handle = tokio::spawn(driver.run());
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        true
    }

    /// Wait until the socket reports open, bounded by the configured connect timeout.
    pub async fn wait_open(&self) -> Result<()> {
        let mut state_rx = self.state_tx.subscribe();
        let waited = timeout(self.config.connect_timeout, async {
            state_rx
                .wait_for(|state| state.is_connected() || state.is_terminated())
                .await
                .map(|state| *state)
        })
        .await;

        match waited {
            Ok(Ok(state)) if state.is_connected() => Ok(()),
            Ok(Ok(_) | Err(_)) => {
                self.wait_closed().await?;
                Err(WsError::ConnectionClosed.into())
            }
            Err(_) => Err(WsError::Timeout.into()),
        }
    }

    /// Wait until the first session of this client is established.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut ready_rx = self.events.ready_receiver();
        let mut state_rx = self.state_tx.subscribe();

        let became_ready = tokio::select! {
            ready = ready_rx.wait_for(|ready| *ready) => ready.is_ok(),
            _ = state_rx.wait_for(|state| state.is_terminated()) => false,
        };

        if became_ready || self.is_ready() {
            Ok(())
        } else {
            Err(WsError::ConnectionClosed.into())
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        *self.events.ready_receiver().borrow()
    }

    /// Stop the connection task. The socket is closed and no reconnect follows.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Wait for the connection task to stop and return its outcome.
    ///
    /// Fatal close codes surface here as [`Kind::Session`] errors. The outcome is delivered
    /// to the first caller; later calls return `Ok(())`.
    pub async fn wait_closed(&self) -> Result<()> {
        let handle = self.task.lock().unwrap_or_else(PoisonError::into_inner).take();

        match handle {
            Some(handle) => handle
                .await
                .map_err(|e| Error::with_source(Kind::Internal, e))?,
            None => Ok(()),
        }
    }

    /// Encode and send a request.
    ///
    /// Resolves once the frame has been written, with `true`, or with `false` when the write
    /// failed or the client has stopped. With [`Config::raise_on_send_failure`] a failure is
    /// returned as an error instead.
    pub async fn send(&self, request: &Request) -> Result<bool> {
        let frame = self.codec.encode(request)?;
        let (ack, ack_rx) = oneshot::channel();

        let sent = self.sender_tx.send(Outbound { frame, ack }).is_ok()
            && ack_rx.await.unwrap_or(false);

        if !sent {
            self.events.warn(format!("Failed to send {} request", request.id()));
            if self.config.raise_on_send_failure {
                return Err(WsError::ConnectionClosed.into());
            }
        }

        Ok(sent)
    }

    /// Register interest in the next message tagged `response_id`.
    pub fn register(&self, response_id: ResponseId) -> PendingWait {
        self.correlator.register(response_id)
    }

    pub(crate) fn events(&self) -> &Events {
        &self.events
    }

    /// Get the current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.session_rx.borrow().clone()
    }

    #[must_use]
    pub fn subscribe_messages(&self) -> broadcast::Receiver<Response> {
        self.events.subscribe_messages()
    }

    #[must_use]
    pub fn subscribe_debug(&self) -> broadcast::Receiver<DebugEvent> {
        self.events.subscribe_debug()
    }

    #[must_use]
    pub fn subscribe_open(&self) -> broadcast::Receiver<()> {
        self.events.subscribe_open()
    }

    #[must_use]
    pub fn subscribe_closed(&self) -> broadcast::Receiver<CloseEvent> {
        self.events.subscribe_closed()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// State owned by the connection task.
struct Driver {
    config: Config,
    codec: Arc<dyn MessageCodec>,
    machine: SessionMachine,
    sender_rx: mpsc::UnboundedReceiver<Outbound>,
    state_tx: watch::Sender<ConnectionState>,
    session_tx: watch::Sender<Session>,
    events: Arc<Events>,
    correlator: Arc<Correlator>,
    shutdown: CancellationToken,
}

impl Driver {
    async fn run(mut self) -> Result<()> {
        let outcome = self.connection_loop().await;

        if let Err(e) = &outcome {
            self.events.error(format!("Client stopped: {e}"));
        }
        _ = self.state_tx.send(ConnectionState::Terminated);
        self.correlator.close();

        outcome
    }

    /// Main connection loop with immediate reconnection on recoverable closes.
    async fn connection_loop(&mut self) -> Result<()> {
        let mut failures = 0_u32;
        let mut attempt = 0_u32;

        loop {
            _ = self.state_tx.send(ConnectionState::Connecting);

            let request = self.connect_request()?;
            let connected = tokio::select! {
                () = self.shutdown.cancelled() => return Ok(()),
                connected = connect_async(request) => connected,
            };

            let ws_stream = match connected {
                Ok((ws_stream, _)) => ws_stream,
                Err(e) => {
                    failures = failures.saturating_add(1);
                    self.events.error(format!("Unable to connect: {e}"));

                    if failures >= self.config.max_connect_failures {
                        return Err(WsError::ConnectFailed { attempts: failures }.into());
                    }

                    attempt = attempt.saturating_add(1);
                    _ = self.state_tx.send(ConnectionState::Reconnecting { attempt });
                    continue;
                }
            };

            failures = 0;
            _ = self.state_tx.send(ConnectionState::Connected {
                since: Instant::now(),
            });
            self.events.log("WebSocket Connected!");
            self.events.open();

            let (code, reason) = match self.handle_connection(ws_stream).await {
                ConnectionEnd::Shutdown => return Ok(()),
                ConnectionEnd::Closed { code, reason } => (code, reason),
            };

            self.report_close(code, &reason);
            self.events.closed(code, reason.clone());

            self.machine.on_close(code, &reason)?;
            self.publish_session();

            if !self.config.reconnect || self.shutdown.is_cancelled() {
                return Ok(());
            }

            attempt = attempt.saturating_add(1);
            _ = self.state_tx.send(ConnectionState::Reconnecting { attempt });
        }
    }

    /// Build the handshake request, attaching resume hints when a session is held.
    fn connect_request(&self) -> Result<HandshakeRequest> {
        let mut request = self.config.endpoint.as_str().into_client_request()?;

        if let Some((session_id, sequence)) = self.machine.resume_hints() {
            let headers = request.headers_mut();
            headers.insert(SESSION_ID_HEADER, HeaderValue::from_str(session_id)?);
            headers.insert(SEQUENCE_HEADER, HeaderValue::from(sequence));
        }

        Ok(request)
    }

    /// Handle an open WebSocket connection until it closes.
    async fn handle_connection(&mut self, ws_stream: WsStream) -> ConnectionEnd {
        let (mut write, mut read) = ws_stream.split();
        let mut heartbeat: Option<HeartbeatScheduler> = None;

        let actions = self.machine.on_open();
        self.publish_session();
        if let Err(end) = self.apply(actions, &mut write, &mut heartbeat).await {
            return end;
        }

        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    _ = write.send(Message::Close(None)).await;
                    return ConnectionEnd::Shutdown;
                }

                // Handle incoming messages
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Binary(bytes))) => {
                            if let Err(end) = self.on_frame(&bytes, &mut write, &mut heartbeat).await {
                                return end;
                            }
                        }
                        Some(Ok(Message::Text(text))) => {
                            if let Err(end) = self.on_frame(text.as_bytes(), &mut write, &mut heartbeat).await {
                                return end;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => return closed_by(frame),
                        Some(Ok(_)) => {
                            // Ping replies are queued by tungstenite itself.
                        }
                        Some(Err(e)) => {
                            self.events.error(format!("WebSocket error: {e}"));
                            return ConnectionEnd::dropped(&e);
                        }
                        None => return ConnectionEnd::dropped(&WsError::ConnectionClosed),
                    }
                }

                // Handle outgoing requests from the client
                Some(outbound) = self.sender_rx.recv() => {
                    let written = write.send(Message::Binary(outbound.frame.into())).await;
                    _ = outbound.ack.send(written.is_ok());

                    if let Err(e) = written {
                        self.events.error(format!("WebSocket error: {e}"));
                        return ConnectionEnd::dropped(&e);
                    }
                }

                () = HeartbeatScheduler::tick(&mut heartbeat) => {
                    let request = Request::Heartbeat(Heartbeat::new(self.machine.session().sequence));
                    if let Err(end) = self.write_request(&request, &mut write).await {
                        return end;
                    }
                }
            }
        }
    }

    /// Broadcast a decoded message, resolve waits on it, then let the state machine act.
    async fn on_frame(
        &mut self,
        bytes: &[u8],
        write: &mut WsSink,
        heartbeat: &mut Option<HeartbeatScheduler>,
    ) -> std::result::Result<(), ConnectionEnd> {
        let message = match self.codec.decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                self.events.warn(format!("Failed to decode message: {e}"));
                return Ok(());
            }
        };

        #[cfg(feature = "tracing")]
        tracing::trace!(?message, "Decoded WebSocket message");

        self.events.message(message.clone());
        self.correlator.dispatch(&message);

        let actions = self.machine.on_message(&message);
        self.publish_session();
        self.apply(actions, write, heartbeat).await
    }

    async fn apply(
        &mut self,
        actions: Vec<Action>,
        write: &mut WsSink,
        heartbeat: &mut Option<HeartbeatScheduler>,
    ) -> std::result::Result<(), ConnectionEnd> {
        for action in actions {
            match action {
                Action::Send(request) => {
                    self.events.debug(format!("Sending {}", request.id()));
                    self.write_request(&request, write).await?;
                }
                Action::StartHeartbeat(period) => {
                    self.events.debug(format!("Heartbeat every {}ms", period.as_millis()));
                    *heartbeat = Some(HeartbeatScheduler::new(period));
                }
                Action::Ready => {
                    self.events.ready();
                }
            }
        }

        Ok(())
    }

    async fn write_request(
        &self,
        request: &Request,
        write: &mut WsSink,
    ) -> std::result::Result<(), ConnectionEnd> {
        let frame = match self.codec.encode(request) {
            Ok(frame) => frame,
            Err(e) => {
                self.events.error(format!("Failed to encode {}: {e}", request.id()));
                return Ok(());
            }
        };

        write
            .send(Message::Binary(frame.into()))
            .await
            .map_err(|e| {
                self.events.error(format!("WebSocket error: {e}"));
                ConnectionEnd::dropped(&e)
            })
    }

    fn report_close(&self, code: Option<u16>, reason: &str) {
        match code.and_then(CloseCode::from_repr) {
            Some(CloseCode::HeartbeatFailed) => self.events.warn("Heartbeat failed, reconnecting"),
            Some(CloseCode::ResumeFailed) => {
                self.events.warn("Resume failed, identifying with a new session");
            }
            Some(CloseCode::InvalidMessage) => self.events.error("Server received an invalid message"),
            Some(CloseCode::InvalidIdentify) => {
                self.events.error(format!("Identify rejected: \"{reason}\""));
            }
            None => self.events.warn(format!(
                "WebSocket Closed{}{}",
                code.map(|c| format!(" with Code {c}")).unwrap_or_default(),
                if reason.is_empty() {
                    String::new()
                } else {
                    format!(" with Reason \"{reason}\"")
                },
            )),
        }
    }

    fn publish_session(&self) {
        self.session_tx.send_replace(self.machine.session().clone());
    }
}

fn closed_by(frame: Option<CloseFrame>) -> ConnectionEnd {
    match frame {
        Some(frame) => ConnectionEnd::Closed {
            code: Some(u16::from(frame.code)),
            reason: frame.reason.to_string(),
        },
        None => ConnectionEnd::Closed {
            code: None,
            reason: String::new(),
        },
    }
}
