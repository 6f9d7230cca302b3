//! Session lifecycle state machine.
//!
//! [`SessionMachine`] holds the session identity and decides what to do on each transport
//! event. It performs no I/O: the connection task feeds it `open`, message and close events
//! and executes the returned [`Action`]s, which keeps the handshake and the close-code
//! policy testable without a socket.

use std::time::Duration;

use crate::auth::Identity;
use crate::error::Closed;
use crate::types::{Identify, Request, Response};

/// The resumable identity of a connection.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Issued by the server; `None` until the first `SessionCreate` and after a failed resume
    pub session_id: Option<String>,
    /// Number of messages received on the current connection, or the server's value after
    /// `SessionCreate`
    pub sequence: u64,
}

/// Close codes defined by the protocol.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::FromRepr)]
#[repr(u16)]
pub enum CloseCode {
    InvalidMessage = 4000,
    HeartbeatFailed = 4001,
    InvalidIdentify = 4002,
    ResumeFailed = 4003,
}

/// What the client does after the socket closes.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseAction {
    /// Open a new connection, resuming the session if one is held
    Reconnect,
    /// Forget the session, then open a new connection that identifies from scratch
    ResetAndReconnect,
    /// Stop and report the close to the caller
    Fatal,
}

impl CloseCode {
    /// The fixed recovery policy for each protocol close code.
    #[must_use]
    pub const fn action(self) -> CloseAction {
        match self {
            Self::HeartbeatFailed => CloseAction::Reconnect,
            Self::ResumeFailed => CloseAction::ResetAndReconnect,
            Self::InvalidMessage | Self::InvalidIdentify => CloseAction::Fatal,
        }
    }
}

/// Recovery policy for any close. Codes outside the protocol range, and closes without a
/// code (dropped socket, transport error), are treated as transient.
#[must_use]
pub fn close_action(code: Option<u16>) -> CloseAction {
    code.and_then(CloseCode::from_repr)
        .map_or(CloseAction::Reconnect, CloseCode::action)
}

/// A side effect requested by the state machine.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum Action {
    /// Write this request to the socket
    Send(Request),
    /// Replace the heartbeat scheduler with one ticking at this period
    StartHeartbeat(Duration),
    /// The first session of this client has been established
    Ready,
}

/// Drives the identify/resume handshake and applies the close-code policy.
#[derive(Debug)]
pub struct SessionMachine {
    identity: Identity,
    session: Session,
    /// `ready` fires once per client, not once per connection
    ready_fired: bool,
    /// Whether an `Identify` has gone out on the current connection
    identified: bool,
}

impl SessionMachine {
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            session: Session::default(),
            ready_fired: false,
            identified: false,
        }
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Session id and sequence to send as resume hints on the next connection attempt.
    #[must_use]
    pub fn resume_hints(&self) -> Option<(&str, u64)> {
        self.session
            .session_id
            .as_deref()
            .map(|id| (id, self.session.sequence))
    }

    /// The transport reported the socket as open.
    pub fn on_open(&mut self) -> Vec<Action> {
        self.session.sequence = 1;
        self.identified = false;

        if self.session.session_id.is_none() {
            return vec![self.identify()];
        }

        // Resuming: the server speaks next with `Metadata` or `SessionCreate`.
        Vec::new()
    }

    /// A decoded message arrived on the socket.
    pub fn on_message(&mut self, message: &Response) -> Vec<Action> {
        self.session.sequence = self.session.sequence.saturating_add(1);

        match message {
            Response::Metadata(metadata) => {
                let mut actions = vec![Action::StartHeartbeat(metadata.heartbeat_period())];
                if !self.identified {
                    actions.push(self.identify());
                }
                actions
            }
            Response::SessionCreate(created) => {
                self.session.session_id = Some(created.session_id.clone());
                self.session.sequence = created.sequence;

                if self.ready_fired {
                    Vec::new()
                } else {
                    self.ready_fired = true;
                    vec![Action::Ready]
                }
            }
            _ => Vec::new(),
        }
    }

    /// The socket closed. Returns whether to reconnect, or the fatal close to report.
    pub fn on_close(&mut self, code: Option<u16>, reason: &str) -> Result<(), Closed> {
        match close_action(code) {
            CloseAction::Reconnect => Ok(()),
            CloseAction::ResetAndReconnect => {
                self.session.session_id = None;
                Ok(())
            }
            CloseAction::Fatal => Err(Closed {
                code: code.unwrap_or_default(),
                reason: reason.to_owned(),
            }),
        }
    }

    fn identify(&mut self) -> Action {
        self.identified = true;
        Action::Send(Request::Identify(Identify::from(&self.identity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metadata, SessionCreate};

    fn machine() -> SessionMachine {
        let identity = Identity::new(
            "0f1b7c3e-2e63-4d3a-9a55-2b7d1c5c8f10",
            "Technoblade",
            "3b0b5fb6-52c2-4d9c-8c3e-7c1b9a1c2d3e",
        )
        .unwrap();
        SessionMachine::new(identity)
    }

    fn is_identify(actions: &[Action]) -> bool {
        actions
            .iter()
            .any(|a| matches!(a, Action::Send(Request::Identify(_))))
    }

    fn is_ready(actions: &[Action]) -> bool {
        actions.iter().any(|a| matches!(a, Action::Ready))
    }

    fn auctions() -> Response {
        Response::Auctions(crate::auctions::AuctionsResponse::default())
    }

    #[test]
    fn close_policy_table() {
        assert_eq!(close_action(Some(4000)), CloseAction::Fatal);
        assert_eq!(close_action(Some(4001)), CloseAction::Reconnect);
        assert_eq!(close_action(Some(4002)), CloseAction::Fatal);
        assert_eq!(close_action(Some(4003)), CloseAction::ResetAndReconnect);
        assert_eq!(close_action(Some(1006)), CloseAction::Reconnect);
        assert_eq!(close_action(None), CloseAction::Reconnect);
    }

    #[test]
    fn fresh_open_identifies_and_sets_sequence_to_one() {
        let mut machine = machine();

        let actions = machine.on_open();

        assert!(is_identify(&actions), "fresh open should identify");
        assert_eq!(machine.session().sequence, 1);
        assert_eq!(machine.resume_hints(), None);
    }

    #[test]
    fn sequence_increments_once_per_message() {
        let mut machine = machine();
        machine.on_open();

        for expected in 2..=6 {
            machine.on_message(&auctions());
            assert_eq!(machine.session().sequence, expected);
        }
    }

    #[test]
    fn session_create_overwrites_state_and_fires_ready_once() {
        let mut machine = machine();
        machine.on_open();

        let actions = machine.on_message(&Response::SessionCreate(SessionCreate::new("abc", 10)));
        assert!(is_ready(&actions), "first session should fire ready");
        assert_eq!(machine.resume_hints(), Some(("abc", 10)));

        // Resume on a new connection: ready must not fire again.
        machine.on_close(Some(4001), "").unwrap();
        let actions = machine.on_open();
        assert!(actions.is_empty(), "resume should wait for the server");
        assert_eq!(machine.resume_hints(), Some(("abc", 1)));

        let actions = machine.on_message(&Response::SessionCreate(SessionCreate::new("abc", 11)));
        assert!(!is_ready(&actions), "ready should fire at most once");
        assert_eq!(machine.session().sequence, 11);
    }

    #[test]
    fn metadata_schedules_heartbeat_and_identifies_when_resuming() {
        let mut machine = machine();
        machine.on_open();
        machine.on_message(&Response::SessionCreate(SessionCreate::new("abc", 2)));
        machine.on_close(None, "").unwrap();
        machine.on_open();

        let actions = machine.on_message(&Response::Metadata(Metadata::new(250)));

        assert!(matches!(
            actions.first(),
            Some(Action::StartHeartbeat(period)) if *period == Duration::from_millis(250)
        ));
        assert!(is_identify(&actions), "resume should identify after metadata");
    }

    #[test]
    fn metadata_does_not_identify_twice_on_one_connection() {
        let mut machine = machine();
        assert!(is_identify(&machine.on_open()), "fresh open should identify");

        let actions = machine.on_message(&Response::Metadata(Metadata::new(250)));

        assert_eq!(actions.len(), 1);
        assert!(!is_identify(&actions), "identify already sent on this connection");
    }

    #[test]
    fn resume_failed_clears_session() {
        let mut machine = machine();
        machine.on_open();
        machine.on_message(&Response::SessionCreate(SessionCreate::new("abc", 2)));

        machine.on_close(Some(CloseCode::ResumeFailed as u16), "").unwrap();

        assert_eq!(machine.resume_hints(), None);
        assert!(is_identify(&machine.on_open()), "next open should identify");
    }

    #[test]
    fn invalid_identify_is_fatal_with_reason() {
        let mut machine = machine();
        machine.on_open();

        let closed = machine.on_close(Some(4002), "Invalid API Key").unwrap_err();

        assert_eq!(closed.code, 4002);
        assert_eq!(closed.reason, "Invalid API Key");
    }

    #[test]
    fn invalid_message_is_fatal() {
        let mut machine = machine();

        assert!(machine.on_close(Some(4000), "").is_err(), "4000 should be fatal");
    }
}
