//! Client event channels.
//!
//! Each event type has its own channel so consumers subscribe only to what they need and
//! a slow consumer of one type never holds back another.

use tokio::sync::{broadcast, watch};

use crate::types::Response;

/// Severity tag of a [`DebugEvent`].
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DebugLevel {
    Log,
    Warn,
    Error,
    Debug,
}

/// A diagnostic emitted by the client.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEvent {
    pub level: DebugLevel,
    pub message: String,
}

/// The server closed the socket, or the socket dropped.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    /// Close code, absent when the socket dropped without a close frame
    pub code: Option<u16>,
    pub reason: String,
}

pub(crate) struct Events {
    debug: broadcast::Sender<DebugEvent>,
    messages: broadcast::Sender<Response>,
    open: broadcast::Sender<()>,
    closed: broadcast::Sender<CloseEvent>,
    ready: watch::Sender<bool>,
}

impl Events {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            debug: broadcast::channel(capacity).0,
            messages: broadcast::channel(capacity).0,
            open: broadcast::channel(capacity).0,
            closed: broadcast::channel(capacity).0,
            ready: watch::channel(false).0,
        }
    }

    /// Emit a diagnostic on the debug channel and, with the `tracing` feature, to the
    /// matching tracing level.
    pub(crate) fn emit(&self, level: DebugLevel, message: String) {
        #[cfg(feature = "tracing")]
        match level {
            DebugLevel::Log => tracing::info!("{message}"),
            DebugLevel::Warn => tracing::warn!("{message}"),
            DebugLevel::Error => tracing::error!("{message}"),
            DebugLevel::Debug => tracing::debug!("{message}"),
        }

        _ = self.debug.send(DebugEvent { level, message });
    }

    pub(crate) fn log<S: Into<String>>(&self, message: S) {
        self.emit(DebugLevel::Log, message.into());
    }

    pub(crate) fn warn<S: Into<String>>(&self, message: S) {
        self.emit(DebugLevel::Warn, message.into());
    }

    pub(crate) fn error<S: Into<String>>(&self, message: S) {
        self.emit(DebugLevel::Error, message.into());
    }

    pub(crate) fn debug<S: Into<String>>(&self, message: S) {
        self.emit(DebugLevel::Debug, message.into());
    }

    pub(crate) fn message(&self, message: Response) {
        _ = self.messages.send(message);
    }

    pub(crate) fn open(&self) {
        _ = self.open.send(());
    }

    pub(crate) fn closed(&self, code: Option<u16>, reason: String) {
        _ = self.closed.send(CloseEvent { code, reason });
    }

    /// Marks the client ready. Returns `false` if it already was.
    pub(crate) fn ready(&self) -> bool {
        let fired = self.ready.send_if_modified(|ready| !std::mem::replace(ready, true));
        if fired {
            self.log("Session established");
        }
        fired
    }

    pub(crate) fn subscribe_debug(&self) -> broadcast::Receiver<DebugEvent> {
        self.debug.subscribe()
    }

    pub(crate) fn subscribe_messages(&self) -> broadcast::Receiver<Response> {
        self.messages.subscribe()
    }

    pub(crate) fn subscribe_open(&self) -> broadcast::Receiver<()> {
        self.open.subscribe()
    }

    pub(crate) fn subscribe_closed(&self) -> broadcast::Receiver<CloseEvent> {
        self.closed.subscribe()
    }

    pub(crate) fn ready_receiver(&self) -> watch::Receiver<bool> {
        self.ready.subscribe()
    }
}
