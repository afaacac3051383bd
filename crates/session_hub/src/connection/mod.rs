//! Connection management for player and worker connections.
//!
//! This module handles the lifecycle of hub connections: the outbound handle
//! every socket is addressed through, the player/worker records, and the
//! registry that indexes them.

pub mod client;
pub mod registry;

pub use client::{PlayerConnection, WorkerConnection};
pub use registry::{ConnectionRegistry, RegistryStats};

use crate::error::ServerError;
use crate::messaging::ServerMessage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use uuid::Uuid;

/// Unique identifier for a socket.
///
/// Two connections for the same player identity always have distinct ids,
/// which is what lets removal of a replaced socket be a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A frame queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Text(String),
    Close,
}

/// Cloneable handle used to address one socket.
///
/// Sends never block: frames go into an unbounded queue drained by the
/// connection's writer task. The socket counts as open for as long as that
/// writer is alive.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    remote_addr: SocketAddr,
    sender: mpsc::UnboundedSender<OutboundFrame>,
    close_signal: Arc<Notify>,
}

impl ConnectionHandle {
    /// Creates a handle together with the receiving end its writer drains.
    pub fn new(remote_addr: SocketAddr) -> (Self, mpsc::UnboundedReceiver<OutboundFrame>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = Self {
            id: ConnectionId::new(),
            remote_addr,
            sender,
            close_signal: Arc::new(Notify::new()),
        };
        (handle, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn is_open(&self) -> bool {
        !self.sender.is_closed()
    }

    /// Queues a raw text frame.
    pub fn send_text(&self, text: impl Into<String>) -> Result<(), ServerError> {
        self.sender
            .send(OutboundFrame::Text(text.into()))
            .map_err(|_| ServerError::Network(format!("Connection {} is closed", self.id)))
    }

    /// Serializes and queues a hub message.
    pub fn send_message(&self, message: &ServerMessage) -> Result<(), ServerError> {
        self.send_text(message.to_text()?)
    }

    /// Asks the writer to send a close frame and the reader to stop.
    pub fn close(&self) {
        let _ = self.sender.send(OutboundFrame::Close);
        self.close_signal.notify_one();
    }

    /// Resolves once [`close`](Self::close) has been called on any clone.
    pub async fn closed(&self) {
        self.close_signal.notified().await;
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ConnectionHandle {}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_handle_ids_are_unique() {
        let (a, _rx_a) = ConnectionHandle::new(addr());
        let (b, _rx_b) = ConnectionHandle::new(addr());
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn test_send_and_close() {
        let (handle, mut rx) = ConnectionHandle::new(addr());
        handle.send_text("hello").unwrap();
        handle.close();

        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Text("hello".into()));
        assert_eq!(rx.try_recv().unwrap(), OutboundFrame::Close);
    }

    #[test]
    fn test_handle_closed_when_writer_gone() {
        let (handle, rx) = ConnectionHandle::new(addr());
        assert!(handle.is_open());
        drop(rx);
        assert!(!handle.is_open());
        assert!(matches!(handle.send_text("late"), Err(ServerError::Network(_))));
    }

    #[tokio::test]
    async fn test_close_wakes_reader() {
        let (handle, _rx) = ConnectionHandle::new(addr());
        let reader = handle.clone();
        handle.close();
        tokio::time::timeout(std::time::Duration::from_secs(1), reader.closed())
            .await
            .expect("close signal should be observed");
    }
}
