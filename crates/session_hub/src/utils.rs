//! # Utility Functions
//!
//! Timestamp generation and server factory helpers.

use crate::{config::ServerConfig, queue::InMemoryQueue, queue::MatchmakingQueue, server::HubServer};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current Unix timestamp in milliseconds.
///
/// A clock set before the epoch yields `0` rather than panicking.
pub fn current_timestamp_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Creates a hub with default configuration and an in-memory queue.
pub fn create_server() -> HubServer {
    create_server_with_config(ServerConfig::default())
}

/// Creates a hub with `config` and an in-memory queue.
pub fn create_server_with_config(config: ServerConfig) -> HubServer {
    create_server_with_queue(config, Arc::new(InMemoryQueue::new()))
}

/// Creates a hub with `config` backed by `queue`.
pub fn create_server_with_queue(config: ServerConfig, queue: Arc<dyn MatchmakingQueue>) -> HubServer {
    HubServer::new(config, queue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_recent() {
        // 2020-01-01T00:00:00Z
        assert!(current_timestamp_millis() > 1_577_836_800_000);
    }

    #[test]
    fn test_create_server_uses_defaults() {
        let server = create_server();
        assert_eq!(server.bind_address(), ServerConfig::default().bind_address);
        assert_eq!(server.get_queue().name(), crate::queue::DEFAULT_QUEUE_NAME);
    }
}
