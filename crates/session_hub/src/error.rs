//! Error types for the session hub.

use crate::queue::QueueError;
use thiserror::Error;

/// Errors surfaced by the hub while accepting connections or routing envelopes.
///
/// None of these close a connection on their own; the per-connection loop
/// logs them and keeps reading.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Network-related error (bind failures, handshake issues, send failures)
    #[error("Network error: {0}")]
    Network(String),
    /// An inbound envelope could not be parsed into its declared shape
    #[error("Protocol error: {0}")]
    Protocol(String),
    /// The matchmaking queue rejected or failed an operation
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
    /// Internal server error (invalid state, serialization of outbound data)
    #[error("Internal error: {0}")]
    Internal(String),
}
