//! Message routing between players, workers and the matchmaking queue.
//!
//! The router holds no session state. Every addressing decision comes from
//! the frame being routed: a player's own identity for input and queueing, the
//! worker's declared roster for snapshots. Lookups that miss are skipped
//! without error.

use crate::connection::{ConnectionHandle, ConnectionRegistry};
use crate::error::ServerError;
use crate::messaging::{InputKey, KeyPayload, PlayerMessage, ServerMessage, WorkerMessage};
use crate::queue::MatchmakingQueue;
use std::sync::Arc;
use tracing::{debug, info};

/// Single dispatch point for inbound frames of both connection classes.
pub struct SessionRouter {
    registry: Arc<ConnectionRegistry>,
    queue: Arc<dyn MatchmakingQueue>,
    welcome_message: String,
}

impl SessionRouter {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        queue: Arc<dyn MatchmakingQueue>,
        welcome_message: impl Into<String>,
    ) -> Self {
        Self {
            registry,
            queue,
            welcome_message: welcome_message.into(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Routes one frame received on a player socket registered as `identity`.
    ///
    /// Malformed frames and queue failures come back as errors for the caller
    /// to log. Identity mismatches, unknown keys and unknown types are dropped
    /// silently.
    pub async fn route_player_message(
        &self,
        connection: &ConnectionHandle,
        identity: &str,
        text: &str,
    ) -> Result<(), ServerError> {
        let Some(message) = PlayerMessage::parse(text)? else {
            debug!("Ignoring unhandled frame from player '{}'", identity);
            return Ok(());
        };

        match message {
            PlayerMessage::Connected => self.welcome(connection),
            PlayerMessage::Heartbeat => {
                self.registry.touch_connection(connection.id()).await;
                Ok(())
            }
            PlayerMessage::StartGame(payload) => self.enqueue(identity, &payload.identity).await,
            PlayerMessage::KeyPressed(payload) | PlayerMessage::KeyReleased(payload) => {
                self.forward_input(identity, &payload, text).await;
                Ok(())
            }
        }
    }

    /// Routes one frame received on a worker socket.
    pub async fn route_worker_message(
        &self,
        connection: &ConnectionHandle,
        text: &str,
    ) -> Result<(), ServerError> {
        let Some(message) = WorkerMessage::parse(text)? else {
            debug!("Ignoring unhandled frame from worker {}", connection.id());
            return Ok(());
        };

        match message {
            WorkerMessage::Connected => self.welcome(connection),
            WorkerMessage::UpdateGame(snapshot) => {
                let recipients = snapshot.player_ids().map(str::to_owned).collect();
                self.deliver(recipients, &ServerMessage::UpdateGame(snapshot), false)
                    .await
            }
            WorkerMessage::StartGame(snapshot) => {
                let recipients = snapshot.player_ids().map(str::to_owned).collect();
                self.deliver(recipients, &ServerMessage::StartGame(snapshot), true)
                    .await
            }
            WorkerMessage::Waiting(waiting) => {
                let recipients = waiting.players.clone();
                self.deliver(recipients, &ServerMessage::Waiting(waiting), true)
                    .await
            }
            WorkerMessage::GameEnded(result) => {
                let recipients = result.players.clone();
                self.deliver(recipients, &ServerMessage::GameEnded(result), true)
                    .await
            }
        }
    }

    fn welcome(&self, connection: &ConnectionHandle) -> Result<(), ServerError> {
        connection.send_message(&ServerMessage::Welcome(self.welcome_message.clone()))
    }

    /// Hands `identity` to the matchmaking queue unless it is already waiting.
    async fn enqueue(&self, identity: &str, claimed: &str) -> Result<(), ServerError> {
        if claimed != identity {
            debug!("Dropping START_GAME from '{}': payload names another identity", identity);
            return Ok(());
        }

        let waiting = self.queue.list().await?;
        if waiting.iter().any(|queued| queued == identity) {
            debug!("'{}' is already waiting in '{}'", identity, self.queue.name());
            return Ok(());
        }

        self.queue.push(identity).await?;
        info!("🎮 '{}' queued for matchmaking on '{}'", identity, self.queue.name());
        Ok(())
    }

    /// Forwards a key event verbatim to every open worker.
    ///
    /// The hub does not know which worker runs the sender's game, so every
    /// worker receives every input.
    async fn forward_input(&self, identity: &str, payload: &KeyPayload, text: &str) {
        if payload.identity != identity {
            debug!("Dropping key event from '{}': payload names another identity", identity);
            return;
        }
        if payload.key.parse::<InputKey>().is_err() {
            debug!("Dropping unrecognized key '{}' from '{}'", payload.key, identity);
            return;
        }

        let delivered = self.registry.forward_to_workers(text).await;
        debug!(
            "⌨️ Forwarded '{}' from '{}' to {} worker(s)",
            payload.key, identity, delivered
        );
    }

    /// Sends `message` to each live player in `recipients`.
    ///
    /// Offline or closed recipients are skipped. With `refresh_activity` each
    /// addressed player's activity timestamp is bumped as well.
    async fn deliver(
        &self,
        recipients: Vec<String>,
        message: &ServerMessage,
        refresh_activity: bool,
    ) -> Result<(), ServerError> {
        let text = message.to_text()?;
        let mut delivered = 0usize;

        for identity in &recipients {
            let handle = if refresh_activity {
                self.registry.touch_player(identity).await
            } else {
                self.registry.player(identity).await
            };

            let Some(handle) = handle else {
                debug!("Skipping offline player '{}'", identity);
                continue;
            };
            match handle.send_text(text.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!("Skipping player '{}': {}", identity, e),
            }
        }

        debug!(
            "📨 {} delivered to {}/{} player(s)",
            message.message_type(),
            delivered,
            recipients.len()
        );
        Ok(())
    }
}
