//! Registry of live player and worker connections.
//!
//! Players are keyed by identity and replaced on duplicate login; workers are
//! an unordered list with no uniqueness constraint. Every mutation happens
//! under one write lock per collection, and fan-out always works on a
//! snapshot of handles taken under the lock and released before sending.

use super::{ConnectionHandle, ConnectionId, PlayerConnection, WorkerConnection};
use crate::messaging::{IdentityPayload, ServerMessage};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Point-in-time registry counts, used for presence reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub players: usize,
    pub active_players: usize,
    pub workers: usize,
}

/// Tracks every live connection the hub is serving.
#[derive(Debug)]
pub struct ConnectionRegistry {
    players: RwLock<HashMap<String, PlayerConnection>>,
    workers: RwLock<Vec<WorkerConnection>>,
    heartbeat_interval: Duration,
    activity_window: Duration,
}

impl ConnectionRegistry {
    pub fn new(heartbeat_interval: Duration, activity_window: Duration) -> Self {
        Self {
            players: RwLock::new(HashMap::new()),
            workers: RwLock::new(Vec::new()),
            heartbeat_interval,
            activity_window,
        }
    }

    /// Registers a player socket under `identity`.
    ///
    /// An existing entry for the same identity is closed and evicted first
    /// (last writer wins). The new entry's keepalive starts immediately.
    pub async fn add_player(&self, handle: ConnectionHandle, identity: impl Into<String>) {
        let identity = identity.into();
        let connection_id = handle.id();
        let entry = PlayerConnection::new(handle, identity.clone(), self.heartbeat_interval);

        let evicted = {
            let mut players = self.players.write().await;
            players.insert(identity.clone(), entry)
        };

        if let Some(old) = evicted {
            info!(
                "♻️ Player '{}' reconnected: closing {} in favour of {}",
                identity,
                old.id(),
                connection_id
            );
            old.handle.close();
            // Dropping `old` cancels its keepalive.
        } else {
            info!("👋 Player '{}' registered on {}", identity, connection_id);
        }
    }

    /// Removes the player registered on `connection_id`.
    ///
    /// Returns the identity that was removed, or `None` when no entry matched
    /// (already removed, or evicted by a newer connection). On removal every
    /// connected worker receives one `USER_DISCONNECTED` for that identity.
    pub async fn remove_player(&self, connection_id: ConnectionId) -> Option<String> {
        let removed = {
            let mut players = self.players.write().await;
            let identity = players
                .iter()
                .find(|(_, p)| p.id() == connection_id)
                .map(|(identity, _)| identity.clone())?;
            players.remove(&identity)
        }?;

        let identity = removed.identity.clone();
        // Cancel the keepalive before anything else can observe the removal.
        drop(removed);

        info!("👋 Player '{}' disconnected ({})", identity, connection_id);
        let notice = ServerMessage::UserDisconnected(IdentityPayload {
            identity: identity.clone(),
        });
        let delivered = self.broadcast_to_workers(&notice).await;
        debug!("📣 USER_DISCONNECTED for '{}' sent to {} worker(s)", identity, delivered);

        Some(identity)
    }

    /// Registers a worker socket. Any number of workers may be open at once.
    pub async fn add_worker(&self, handle: ConnectionHandle) {
        let connection_id = handle.id();
        let mut workers = self.workers.write().await;
        workers.push(WorkerConnection::new(handle));
        info!("🛠️ Worker registered on {} ({} total)", connection_id, workers.len());
    }

    /// Removes a worker socket. No-op when it is not registered.
    pub async fn remove_worker(&self, connection_id: ConnectionId) -> bool {
        let mut workers = self.workers.write().await;
        let before = workers.len();
        workers.retain(|w| w.id() != connection_id);
        let removed = workers.len() != before;
        if removed {
            info!("🛠️ Worker {} disconnected ({} remaining)", connection_id, workers.len());
        }
        removed
    }

    /// Handle of the live player registered under `identity`.
    pub async fn player(&self, identity: &str) -> Option<ConnectionHandle> {
        let players = self.players.read().await;
        players
            .get(identity)
            .filter(|p| p.handle.is_open())
            .map(|p| p.handle.clone())
    }

    /// Refreshes the activity timestamp of `identity` and returns its handle
    /// if the player is live.
    pub async fn touch_player(&self, identity: &str) -> Option<ConnectionHandle> {
        let mut players = self.players.write().await;
        let player = players.get_mut(identity).filter(|p| p.handle.is_open())?;
        player.touch();
        Some(player.handle.clone())
    }

    /// Refreshes the activity timestamp of the player on `connection_id`.
    ///
    /// Returns `false` if that socket is no longer the registered one.
    pub async fn touch_connection(&self, connection_id: ConnectionId) -> bool {
        let mut players = self.players.write().await;
        match players.values_mut().find(|p| p.id() == connection_id) {
            Some(player) => {
                player.touch();
                true
            }
            None => false,
        }
    }

    /// Identities with an open socket and activity within the window.
    ///
    /// Advisory only; nothing is closed because it is missing here.
    pub async fn list_active_players(&self) -> Vec<String> {
        let now = Instant::now();
        let players = self.players.read().await;
        let mut active: Vec<String> = players
            .values()
            .filter(|p| p.is_active(now, self.activity_window))
            .map(|p| p.identity.clone())
            .collect();
        active.sort();
        active
    }

    /// Every registered identity, active or not.
    pub async fn player_identities(&self) -> HashSet<String> {
        self.players.read().await.keys().cloned().collect()
    }

    pub async fn count_players(&self) -> usize {
        self.players.read().await.len()
    }

    pub async fn count_workers(&self) -> usize {
        self.workers.read().await.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.count_players().await + self.count_workers().await
    }

    pub async fn stats(&self) -> RegistryStats {
        RegistryStats {
            players: self.count_players().await,
            active_players: self.list_active_players().await.len(),
            workers: self.count_workers().await,
        }
    }

    /// Snapshot of open worker handles.
    pub async fn worker_handles(&self) -> Vec<ConnectionHandle> {
        let workers = self.workers.read().await;
        workers
            .iter()
            .filter(|w| w.handle.is_open())
            .map(|w| w.handle.clone())
            .collect()
    }

    /// Sends a hub message to every open worker. Returns how many accepted it.
    pub async fn broadcast_to_workers(&self, message: &ServerMessage) -> usize {
        match message.to_text() {
            Ok(text) => self.forward_to_workers(&text).await,
            Err(e) => {
                warn!("Failed to encode {} for workers: {}", message.message_type(), e);
                0
            }
        }
    }

    /// Sends a raw frame to every open worker. Returns how many accepted it.
    pub async fn forward_to_workers(&self, text: &str) -> usize {
        let mut delivered = 0;
        for worker in self.worker_handles().await {
            match worker.send_text(text) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Skipping worker {}: {}", worker.id(), e),
            }
        }
        delivered
    }

    /// Closes every connection and empties the registry.
    pub async fn shutdown_all(&self) {
        let players: Vec<PlayerConnection> = {
            let mut players = self.players.write().await;
            players.drain().map(|(_, p)| p).collect()
        };
        for player in &players {
            player.handle.close();
        }

        let workers: Vec<WorkerConnection> = {
            let mut workers = self.workers.write().await;
            workers.drain(..).collect()
        };
        for worker in &workers {
            worker.handle.close();
        }

        info!(
            "🧹 Closed {} player and {} worker connection(s)",
            players.len(),
            workers.len()
        );
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_millis(30_000))
    }
}
