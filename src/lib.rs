//! Client for the SkyBlock auction server.
//!
//! The server speaks a small binary message protocol over a WebSocket. A [`Client`] identifies
//! with a player [`Identity`](auth::Identity), keeps its session alive with heartbeats on the
//! period the server advertises, and resumes the session after recoverable disconnects.
//! Requests are matched to responses by message identifier, and
//! [`Client::fetch_auctions`] builds on that to query the auction house.
//!
//! # Modules
//!
//! - [`client`]: the public [`Client`]
//! - [`ws`]: connection task, session state machine, heartbeats and request correlation
//! - [`auctions`]: auction query options, normalization and listing decoding
//! - [`types`]: protocol message identifiers and payloads
//! - [`auth`]: validated player identity
//! - [`error`]: the crate [`Error`](error::Error) and its [`Kind`](error::Kind)
//!
//! Enable the `tracing` feature to route client diagnostics to [`tracing`](https://docs.rs/tracing).

pub mod auctions;
pub mod auth;
pub mod client;
pub mod error;
pub(crate) mod serde_helpers;
pub mod types;
pub mod ws;

use crate::error::Error;

pub use client::Client;

pub type Result<T> = std::result::Result<T, Error>;
