#![allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    reason = "Do not need additional syntax for setting up tests, and https://github.com/rust-lang/rust-clippy/issues/13981"
)]
#![allow(
    unused,
    reason = "Each test binary uses a different subset of the helpers"
)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt as _, StreamExt as _};
use serde_json::Value;
use skyblock_client_sdk::Client;
use skyblock_client_sdk::ws::config::Config;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

pub const PLAYER_UUID: &str = "0f1b7c3e-2e63-4d3a-9a55-2b7d1c5c8f10";
pub const USERNAME: &str = "Technoblade";
pub const API_KEY: &str = "3b0b5fb6-52c2-4d9c-8c3e-7c1b9a1c2d3e";

/// How long a helper waits for the client before giving up.
pub const WAIT: Duration = Duration::from_secs(2);

/// Resume headers seen on one handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub session_id: Option<String>,
    pub sequence: Option<u64>,
}

#[derive(Debug, Clone)]
enum Command {
    Send(Value),
    Close(u16, String),
}

/// Mock session server.
///
/// Every accepted socket records its handshake headers, forwards each client frame decoded as
/// JSON, and obeys commands broadcast to all open sockets.
pub struct MockWsServer {
    addr: SocketAddr,
    command_tx: broadcast::Sender<Command>,
    handshake_rx: mpsc::UnboundedReceiver<Handshake>,
    frame_rx: mpsc::UnboundedReceiver<Value>,
}

impl MockWsServer {
    /// Start a mock server on a random port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (command_tx, _) = broadcast::channel::<Command>(100);
        let (handshake_tx, handshake_rx) = mpsc::unbounded_channel();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel();

        let commands = command_tx.clone();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };

                // Subscribe before the handshake completes so a test reacting to the handshake
                // cannot send a command this socket misses.
                let mut command_rx = commands.subscribe();
                let handshake_tx = handshake_tx.clone();
                let frame_tx = frame_tx.clone();

                let callback = move |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
                    let header = |name: &str| {
                        request
                            .headers()
                            .get(name)
                            .and_then(|value| value.to_str().ok())
                            .map(str::to_owned)
                    };
                    drop(handshake_tx.send(Handshake {
                        session_id: header("x-session-id"),
                        sequence: header("x-sequence").and_then(|value| value.parse().ok()),
                    }));
                    Ok(response)
                };

                let Ok(ws_stream) = tokio_tungstenite::accept_hdr_async(stream, callback).await
                else {
                    continue;
                };

                let (mut write, mut read) = ws_stream.split();

                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            msg = read.next() => {
                                match msg {
                                    Some(Ok(Message::Binary(bytes))) => {
                                        drop(frame_tx.send(serde_json::from_slice(&bytes).unwrap()));
                                    }
                                    Some(Ok(Message::Text(text))) => {
                                        drop(frame_tx.send(serde_json::from_str(&text).unwrap()));
                                    }
                                    Some(Ok(_)) => {}
                                    _ => break,
                                }
                            }
                            command = command_rx.recv() => {
                                match command {
                                    Ok(Command::Send(value)) => {
                                        let bytes = serde_json::to_vec(&value).unwrap();
                                        if write.send(Message::Binary(bytes.into())).await.is_err() {
                                            break;
                                        }
                                    }
                                    Ok(Command::Close(code, reason)) => {
                                        let frame = CloseFrame {
                                            code: CloseCode::from(code),
                                            reason: reason.into(),
                                        };
                                        drop(write.send(Message::Close(Some(frame))).await);
                                        break;
                                    }
                                    Err(_) => break,
                                }
                            }
                        }
                    }
                });
            }
        });

        Self {
            addr,
            command_tx,
            handshake_rx,
            frame_rx,
        }
    }

    #[must_use]
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Send a message to all open sockets.
    pub fn send(&self, message: Value) {
        drop(self.command_tx.send(Command::Send(message)));
    }

    /// Close all open sockets with a code and reason.
    pub fn close(&self, code: u16, reason: &str) {
        drop(self.command_tx.send(Command::Close(code, reason.to_owned())));
    }

    /// The next completed handshake.
    pub async fn next_handshake(&mut self) -> Option<Handshake> {
        self.next_handshake_within(WAIT).await
    }

    pub async fn next_handshake_within(&mut self, within: Duration) -> Option<Handshake> {
        timeout(within, self.handshake_rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// The next client frame.
    pub async fn next_frame(&mut self) -> Option<Value> {
        self.next_frame_within(WAIT).await
    }

    pub async fn next_frame_within(&mut self, within: Duration) -> Option<Value> {
        timeout(within, self.frame_rx.recv()).await.ok().flatten()
    }

    /// Discard every client frame received so far.
    pub fn drain_frames(&mut self) {
        while self.frame_rx.try_recv().is_ok() {}
    }

    /// The next client frame tagged `id`, skipping others.
    pub async fn next_frame_with_id(&mut self, id: u8) -> Option<Value> {
        loop {
            let frame = self.next_frame().await?;
            if frame["id"] == id {
                return Some(frame);
            }
        }
    }
}

pub fn client(server: &MockWsServer) -> Client {
    client_with(server, Config::default())
}

/// A client for `server` with every other setting taken from `config`.
pub fn client_with(server: &MockWsServer, mut config: Config) -> Client {
    config.endpoint = server.ws_url();
    Client::new(PLAYER_UUID, USERNAME, API_KEY, config).unwrap()
}

/// Frames the server sends, in the default JSON envelope.
pub mod frames {
    use serde_json::{Value, json};

    #[must_use]
    pub fn metadata(heartbeat_interval: u64) -> Value {
        json!({ "id": 0, "data": { "heartbeatInterval": heartbeat_interval } })
    }

    #[must_use]
    pub fn session_create(session_id: &str, sequence: u64) -> Value {
        json!({ "id": 1, "data": { "sessionId": session_id, "sequence": sequence } })
    }

    #[must_use]
    pub fn auctions(auctions: Value) -> Value {
        json!({ "id": 2, "data": { "auctions": auctions } })
    }
}
