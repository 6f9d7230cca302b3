#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use bon::Builder;

const DEFAULT_ENDPOINT: &str = "wss://skyblock-server.app/ws";
const DEFAULT_MAX_CONNECT_FAILURES: u32 = 3;
const DEFAULT_EVENT_CAPACITY: usize = 1024;
const DEFAULT_CONNECT_TIMEOUT_DURATION: Duration = Duration::from_secs(10);

/// Configuration for the session client.
#[non_exhaustive]
#[derive(Debug, Clone, Builder)]
pub struct Config {
    /// WebSocket endpoint of the server
    #[builder(into, default = DEFAULT_ENDPOINT.to_owned())]
    pub endpoint: String,
    /// Reconnect immediately when the server closes with a recoverable code.
    /// When `false`, every close ends the client.
    #[builder(default = true)]
    pub reconnect: bool,
    /// Consecutive failed socket handshakes tolerated before giving up
    #[builder(default = DEFAULT_MAX_CONNECT_FAILURES)]
    pub max_connect_failures: u32,
    /// Return an error from `send` instead of `Ok(false)` when a frame cannot be written
    #[builder(default)]
    pub raise_on_send_failure: bool,
    /// Capacity of each event broadcast channel
    #[builder(default = DEFAULT_EVENT_CAPACITY)]
    pub event_capacity: usize,
    /// Maximum time `connect` waits for the socket to open
    #[builder(default = DEFAULT_CONNECT_TIMEOUT_DURATION)]
    pub connect_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnects_with_three_handshake_failures() {
        let config = Config::default();

        assert!(config.reconnect, "reconnect should be on by default");
        assert_eq!(config.max_connect_failures, 3);
        assert!(!config.raise_on_send_failure, "send should not raise by default");
        assert_eq!(config.endpoint, "wss://skyblock-server.app/ws");
    }

    #[test]
    fn builder_overrides_endpoint() {
        let config = Config::builder()
            .endpoint("ws://127.0.0.1:9000")
            .reconnect(false)
            .build();

        assert_eq!(config.endpoint, "ws://127.0.0.1:9000");
        assert!(!config.reconnect, "reconnect should be disabled");
        assert_eq!(config.event_capacity, 1024);
    }
}
