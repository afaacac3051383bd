//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and customize the hub's behavior.

use std::net::SocketAddr;
use std::time::Duration;

/// Default WELCOME payload sent in reply to `CONNECTED`.
pub const DEFAULT_WELCOME_MESSAGE: &str = "Welcome to Power Spree!!";

/// Configuration structure for the session hub.
///
/// Contains the network settings, the worker credential, liveness timing and
/// presence reporting cadence.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections (players plus workers)
    pub max_connections: usize,

    /// Shared secret that identifies a connection as a simulation worker
    pub worker_secret: String,

    /// Payload of the WELCOME reply
    pub welcome_message: String,

    /// Period of the per-player HEARTBEAT keepalive
    pub heartbeat_interval: Duration,

    /// A player counts as active while its last activity is younger than this
    pub activity_window: Duration,

    /// How often registry counts are reported (zero disables reporting)
    pub presence_interval: Duration,
}

impl ServerConfig {
    /// Creates a configuration bound to `bind_address` that accepts workers
    /// presenting `worker_secret`. Everything else takes its default.
    pub fn new(bind_address: SocketAddr, worker_secret: impl Into<String>) -> Self {
        Self {
            bind_address,
            worker_secret: worker_secret.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_welcome_message(mut self, message: impl Into<String>) -> Self {
        self.welcome_message = message.into();
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_activity_window(mut self, window: Duration) -> Self {
        self.activity_window = window;
        self
    }

    pub fn with_presence_interval(mut self, interval: Duration) -> Self {
        self.presence_interval = interval;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 5555)),
            max_connections: 1000,
            worker_secret: String::new(),
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            heartbeat_interval: Duration::from_secs(5),
            activity_window: Duration::from_millis(30_000),
            presence_interval: Duration::from_secs(30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address.port(), 5555);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(5));
        assert_eq!(config.activity_window, Duration::from_millis(30_000));
        assert_eq!(config.welcome_message, DEFAULT_WELCOME_MESSAGE);
        assert!(config.worker_secret.is_empty());
    }

    #[test]
    fn test_builder_overrides() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap(), "s3cret")
            .with_max_connections(4)
            .with_heartbeat_interval(Duration::from_millis(250))
            .with_presence_interval(Duration::ZERO);

        assert_eq!(config.worker_secret, "s3cret");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.heartbeat_interval, Duration::from_millis(250));
        assert!(config.presence_interval.is_zero());
        assert_eq!(config.activity_window, Duration::from_millis(30_000));
    }
}
