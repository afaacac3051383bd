//! Player and worker connection records.

use super::{ConnectionHandle, ConnectionId};
use crate::liveness::KeepaliveTask;
use tokio::time::{Duration, Instant};

/// A registered player socket.
///
/// The keepalive task is owned by the record, so dropping the record (on
/// removal, eviction or registry teardown) cancels the timer.
#[derive(Debug)]
pub struct PlayerConnection {
    pub handle: ConnectionHandle,
    pub identity: String,
    pub last_active: Instant,
    _keepalive: KeepaliveTask,
}

impl PlayerConnection {
    /// Creates the record and starts its keepalive.
    pub fn new(handle: ConnectionHandle, identity: String, heartbeat_interval: Duration) -> Self {
        let keepalive = KeepaliveTask::spawn(handle.clone(), heartbeat_interval);
        Self {
            handle,
            identity,
            last_active: Instant::now(),
            _keepalive: keepalive,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Open socket with activity inside `window`.
    pub fn is_active(&self, now: Instant, window: Duration) -> bool {
        self.handle.is_open() && now.saturating_duration_since(self.last_active) < window
    }
}

/// A registered simulation worker socket. The token it presented is checked
/// at handshake time and not kept.
#[derive(Debug, Clone)]
pub struct WorkerConnection {
    pub handle: ConnectionHandle,
}

impl WorkerConnection {
    pub fn new(handle: ConnectionHandle) -> Self {
        Self { handle }
    }

    pub fn id(&self) -> ConnectionId {
        self.handle.id()
    }
}
