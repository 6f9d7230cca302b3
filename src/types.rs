//! Protocol message identifiers and the typed messages exchanged with the server.
//!
//! Outbound messages are [`Request`]s tagged by a [`RequestId`]; inbound messages are
//! [`Response`]s tagged by a [`ResponseId`]. The byte layout belongs to the
//! [`MessageCodec`](crate::ws::MessageCodec) in use.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};
use uuid::Uuid;

/// Date and time types for auction timestamps.
pub use chrono::{DateTime, Utc};

use crate::auctions::{AuctionsRequest, AuctionsResponse};
use crate::auth::{Identity, serialize_secret};

/// Identifier of an outbound request.
#[non_exhaustive]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr, strum_macros::Display,
)]
#[repr(u8)]
pub enum RequestId {
    Identify = 0,
    Heartbeat = 1,
    RequestAuctions = 2,
}

/// Identifier of an inbound response.
#[non_exhaustive]
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize_repr,
    Deserialize_repr,
    strum_macros::Display,
    strum_macros::FromRepr,
)]
#[repr(u8)]
pub enum ResponseId {
    Metadata = 0,
    SessionCreate = 1,
    Auctions = 2,
}

/// A typed outbound message.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub enum Request {
    Identify(Identify),
    Heartbeat(Heartbeat),
    RequestAuctions(AuctionsRequest),
}

impl Request {
    /// The identifier this request is tagged with on the wire.
    #[must_use]
    pub const fn id(&self) -> RequestId {
        match self {
            Self::Identify(_) => RequestId::Identify,
            Self::Heartbeat(_) => RequestId::Heartbeat,
            Self::RequestAuctions(_) => RequestId::RequestAuctions,
        }
    }

    /// Serializes the request body without its identifier.
    pub fn payload(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Identify(identify) => serde_json::to_value(identify),
            Self::Heartbeat(heartbeat) => serde_json::to_value(heartbeat),
            Self::RequestAuctions(request) => serde_json::to_value(request),
        }
    }
}

/// Authenticates a fresh connection, or completes a resume after [`Metadata`].
///
/// # Security
///
/// When serialized, this struct exposes the API key in plaintext. Only send it over `wss://`.
#[non_exhaustive]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Identify {
    pub uuid: Uuid,
    pub username: String,
    #[serde(serialize_with = "serialize_secret")]
    pub api_key: SecretString,
}

impl From<&Identity> for Identify {
    fn from(identity: &Identity) -> Self {
        Self {
            uuid: identity.uuid,
            username: identity.username.clone(),
            api_key: identity.api_key.clone(),
        }
    }
}

/// Keepalive sent on the server-advertised interval.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Heartbeat {
    /// Sequence number of the last message received
    pub sequence: u64,
}

impl Heartbeat {
    #[must_use]
    pub const fn new(sequence: u64) -> Self {
        Self { sequence }
    }
}

/// A typed inbound message.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Metadata(Metadata),
    SessionCreate(SessionCreate),
    Auctions(AuctionsResponse),
}

impl Response {
    /// The identifier this response was tagged with on the wire.
    #[must_use]
    pub const fn id(&self) -> ResponseId {
        match self {
            Self::Metadata(_) => ResponseId::Metadata,
            Self::SessionCreate(_) => ResponseId::SessionCreate,
            Self::Auctions(_) => ResponseId::Auctions,
        }
    }

    #[must_use]
    pub fn as_metadata(&self) -> Option<&Metadata> {
        match self {
            Self::Metadata(metadata) => Some(metadata),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_session_create(&self) -> Option<&SessionCreate> {
        match self {
            Self::SessionCreate(session) => Some(session),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_auctions(self) -> Option<AuctionsResponse> {
        match self {
            Self::Auctions(auctions) => Some(auctions),
            _ => None,
        }
    }
}

/// Connection metadata, sent by the server once a socket opens.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Heartbeat period in milliseconds
    pub heartbeat_interval: u64,
}

impl Metadata {
    #[must_use]
    pub const fn new(heartbeat_interval: u64) -> Self {
        Self { heartbeat_interval }
    }

    #[must_use]
    pub const fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval)
    }
}

/// Authoritative session state issued by the server after identify or resume.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreate {
    pub session_id: String,
    pub sequence: u64,
}

impl SessionCreate {
    #[must_use]
    pub fn new<S: Into<String>>(session_id: S, sequence: u64) -> Self {
        Self {
            session_id: session_id.into(),
            sequence,
        }
    }
}
