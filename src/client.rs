use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_stream::try_stream;
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::Result;
use crate::auctions::{AuctionFetchOptions, AuctionListing, AuctionsRequest, into_listings};
use crate::auth::Identity;
use crate::error::Error;
use crate::types::{Request, Response, ResponseId};
use crate::ws::config::Config;
use crate::ws::connection::ConnectionState;
use crate::ws::{CloseEvent, ConnectionManager, DebugEvent, JsonCodec, MessageCodec, Session, WsError};

/// Session client for the auction server.
///
/// The client identifies on first connect, keeps the session alive with heartbeats, and
/// resumes it transparently whenever the server closes with a recoverable code. Requests are
/// correlated with their responses by message identifier.
///
/// # Examples
///
/// ```rust, no_run
/// use skyblock_client_sdk::Client;
/// use skyblock_client_sdk::auctions::AuctionFetchOptions;
/// use skyblock_client_sdk::ws::config::Config;
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = Client::new(
///         "0f1b7c3e-2e63-4d3a-9a55-2b7d1c5c8f10",
///         "Technoblade",
///         "3b0b5fb6-52c2-4d9c-8c3e-7c1b9a1c2d3e",
///         Config::default(),
///     )?;
///     client.connect().await?;
///     client.ready().await?;
///
///     let options = AuctionFetchOptions::builder()
///         .query("Hyperion".to_owned())
///         .rarity("legendary".to_owned())
///         .build();
///     for listing in client.fetch_auctions(options).await? {
///         println!("{} for {}", listing.item_name, listing.starting_bid);
///     }
///
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    /// Validated player identity, also owned by the connection task
    identity: Identity,
    /// Background connection task and its channels
    connection: ConnectionManager,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("identity", &self.inner.identity)
            .field("state", &self.connection_state())
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client that speaks the default JSON envelope.
    ///
    /// Validates the identity and the endpoint. Nothing connects until [`Client::connect`].
    pub fn new(uuid: &str, username: &str, api_key: &str, config: Config) -> Result<Self> {
        Self::with_codec(uuid, username, api_key, config, JsonCodec)
    }

    /// Create a client with a custom frame codec.
    pub fn with_codec<C: MessageCodec>(
        uuid: &str,
        username: &str,
        api_key: &str,
        config: Config,
        codec: C,
    ) -> Result<Self> {
        let identity = Identity::new(uuid, username, api_key)?;

        let endpoint = Url::parse(&config.endpoint)?;
        if !matches!(endpoint.scheme(), "ws" | "wss") {
            return Err(Error::validation(format!(
                "Unsupported endpoint scheme {}",
                endpoint.scheme()
            )));
        }

        let connection = ConnectionManager::new(identity.clone(), config, Arc::new(codec));

        Ok(Self {
            inner: Arc::new(ClientInner {
                identity,
                connection,
            }),
        })
    }

    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    /// Open the connection and wait for the socket to report open.
    ///
    /// Returns before the session is established; use [`Client::ready`] to wait for that.
    /// Calling it again on a running client only waits for the socket.
    pub async fn connect(&self) -> Result<()> {
        self.inner.connection.start();
        self.inner.connection.wait_open().await
    }

    /// Wait until the first session of this client is established.
    pub async fn ready(&self) -> Result<()> {
        self.inner.connection.wait_ready().await
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.connection.is_ready()
    }

    /// Encode and send a request.
    ///
    /// Returns `Ok(true)` once the frame is written and `Ok(false)` when it could not be,
    /// unless [`Config::raise_on_send_failure`] is set.
    pub async fn send(&self, request: &Request) -> Result<bool> {
        self.inner.connection.send(request).await
    }

    /// Wait for the next message tagged `response_id`.
    ///
    /// Resolves to `None` when `timeout` elapses first. The wait is registered on the first
    /// poll, so waits joined together are all in place before any message is handled.
    pub async fn await_message(
        &self,
        response_id: ResponseId,
        timeout: Option<Duration>,
    ) -> Option<Response> {
        self.inner
            .connection
            .register(response_id)
            .wait(timeout, None)
            .await
    }

    /// Like [`Client::await_message`], also resolving to `None` once `cancel` fires.
    pub async fn await_message_with_cancel(
        &self,
        response_id: ResponseId,
        timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> Option<Response> {
        self.inner
            .connection
            .register(response_id)
            .wait(timeout, Some(cancel))
            .await
    }

    /// Query the auction house, waiting as long as it takes for the response.
    pub async fn fetch_auctions(&self, options: AuctionFetchOptions) -> Result<Vec<AuctionListing>> {
        self.fetch_auctions_with_timeout(options, None).await
    }

    /// Query the auction house.
    ///
    /// Filter values that do not normalize to a known category, rarity or type are dropped.
    /// Fails with [`Kind::Query`](crate::error::Kind::Query) when no response arrives within
    /// `timeout` or the response has no listings.
    pub async fn fetch_auctions_with_timeout(
        &self,
        options: AuctionFetchOptions,
        timeout: Option<Duration>,
    ) -> Result<Vec<AuctionListing>> {
        let connection = &self.inner.connection;
        let request = Request::RequestAuctions(AuctionsRequest::from(options));

        // Register before sending so the response cannot slip past.
        let pending = connection.register(ResponseId::Auctions);

        if !connection.send(&request).await? {
            let error = Error::query("auctions request could not be sent");
            connection.events().error(error.to_string());
            return Err(error);
        }

        into_listings(pending.wait(timeout, None).await).inspect_err(|e| {
            connection.events().error(e.to_string());
        })
    }

    /// Snapshot of the current session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.inner.connection.session()
    }

    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        self.inner.connection.state()
    }

    /// Subscribe to connection state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection.state_receiver()
    }

    /// Close the socket. The client does not reconnect afterwards.
    pub fn close(&self) {
        self.inner.connection.close();
    }

    /// Wait for the client to stop.
    ///
    /// Resolves with a [`Kind::Session`](crate::error::Kind::Session) error carrying the
    /// server's reason when a fatal close code ended the session.
    pub async fn wait_closed(&self) -> Result<()> {
        self.inner.connection.wait_closed().await
    }

    /// Every decoded inbound message, before the client acts on it.
    #[must_use]
    pub fn subscribe_messages(&self) -> broadcast::Receiver<Response> {
        self.inner.connection.subscribe_messages()
    }

    /// Client diagnostics tagged with a [`DebugLevel`](crate::ws::DebugLevel).
    #[must_use]
    pub fn subscribe_debug(&self) -> broadcast::Receiver<DebugEvent> {
        self.inner.connection.subscribe_debug()
    }

    /// Fires each time a socket opens, including reconnects.
    #[must_use]
    pub fn subscribe_open(&self) -> broadcast::Receiver<()> {
        self.inner.connection.subscribe_open()
    }

    /// Fires each time a socket closes, with the server's code and reason.
    #[must_use]
    pub fn subscribe_closed(&self) -> broadcast::Receiver<CloseEvent> {
        self.inner.connection.subscribe_closed()
    }

    /// Stream of decoded inbound messages.
    ///
    /// Ends with an error if the consumer falls behind and messages were skipped.
    pub fn messages(&self) -> impl Stream<Item = Result<Response>> {
        let mut rx = self.subscribe_messages();

        try_stream! {
            loop {
                match rx.recv().await {
                    Ok(message) => yield message,
                    Err(RecvError::Lagged(count)) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!("Message stream lagged, missed {count} messages");
                        Err(WsError::Lagged { count })?;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }
}
