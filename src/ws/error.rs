#![expect(
    clippy::module_name_repetitions,
    reason = "Error types include the module name to indicate their scope"
)]

use std::error::Error as StdError;
use std::fmt;

/// WebSocket error variants.
#[non_exhaustive]
#[derive(Debug)]
pub enum WsError {
    /// Error connecting to or communicating with the WebSocket server
    Connection(tokio_tungstenite::tungstenite::Error),
    /// Error parsing a WebSocket message
    MessageParse(serde_json::Error),
    /// WebSocket connection was closed
    ConnectionClosed,
    /// Operation timed out
    Timeout,
    /// Received an invalid or unexpected message
    InvalidMessage(String),
    /// Received a message tagged with an identifier the client does not know
    UnknownResponse(u8),
    /// Gave up after too many consecutive failed handshakes
    ConnectFailed {
        /// Number of failed handshakes in a row
        attempts: u32,
    },
    /// A message stream fell behind and skipped messages
    Lagged {
        /// Number of messages skipped
        count: u64,
    },
}

impl fmt::Display for WsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connection(e) => write!(f, "WebSocket connection error: {e}"),
            Self::MessageParse(e) => write!(f, "Failed to parse WebSocket message: {e}"),
            Self::ConnectionClosed => write!(f, "WebSocket connection closed"),
            Self::Timeout => write!(f, "WebSocket operation timed out"),
            Self::InvalidMessage(msg) => write!(f, "Invalid WebSocket message: {msg}"),
            Self::UnknownResponse(id) => write!(f, "Unknown response identifier {id}"),
            Self::ConnectFailed { attempts } => {
                write!(f, "Unable to connect after {attempts} attempts")
            }
            Self::Lagged { count } => write!(f, "Message stream lagged, missed {count} messages"),
        }
    }
}

impl StdError for WsError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Connection(e) => Some(e),
            Self::MessageParse(e) => Some(e),
            _ => None,
        }
    }
}

// Integration with main Error type
impl From<WsError> for crate::error::Error {
    fn from(e: WsError) -> Self {
        let kind = match e {
            WsError::MessageParse(_) | WsError::InvalidMessage(_) | WsError::UnknownResponse(_) => {
                crate::error::Kind::Codec
            }
            _ => crate::error::Kind::WebSocket,
        };
        crate::error::Error::with_source(kind, e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for crate::error::Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        crate::error::Error::with_source(crate::error::Kind::WebSocket, WsError::Connection(e))
    }
}
