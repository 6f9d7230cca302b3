//! Resumable session transport.
//!
//! This module owns everything between the socket and the typed protocol messages.
//!
//! # Architecture
//!
//! - [`ConnectionManager`]: Background connection task with heartbeat and resume-on-reconnect
//! - [`SessionMachine`]: The identify/resume handshake and close-code policy, free of I/O
//! - [`Correlator`]: Resolves waits on the next message with a given [`ResponseId`](crate::types::ResponseId)
//! - [`MessageCodec`]: Trait for turning requests into frames and frames into responses
//!
//! Heartbeats follow the period the server advertises in `Metadata` and always carry the
//! current sequence number. Reconnects reuse the held session through resume headers.

pub mod config;
pub mod connection;
pub mod correlator;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod session;
pub mod traits;

pub use connection::{ConnectionManager, ConnectionState};
pub use correlator::{Correlator, PendingWait};
#[expect(
    clippy::module_name_repetitions,
    reason = "WsError includes module name for clarity when used outside this module"
)]
pub use error::WsError;
pub use events::{CloseEvent, DebugEvent, DebugLevel};
pub use session::{CloseAction, CloseCode, Session, SessionMachine, close_action};
pub use traits::*;
