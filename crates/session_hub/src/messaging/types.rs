//! Message type definitions for hub communication.
//!
//! Every frame on every connection is a JSON envelope:
//!
//! ```json
//! { "type": "KEY_PRESSED", "payload": { "identity": "alice", "key": "KeyF" } }
//! ```
//!
//! Inbound frames are decoded in two steps. The raw [`Envelope`] is parsed
//! first so that unknown `type` values can be ignored rather than rejected,
//! then the payload is decoded into the variant of [`PlayerMessage`] or
//! [`WorkerMessage`] that the type declares. A payload that does not match its
//! declared shape is a protocol error.
//!
//! Fields other than identities (game ids, orbs, per-player state) are opaque
//! to the hub and kept as [`serde_json::Value`].

use crate::error::ServerError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// The closed set of envelope types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Connected,
    Welcome,
    Heartbeat,
    StartGame,
    KeyPressed,
    KeyReleased,
    Waiting,
    UpdateGame,
    GameEnded,
    UserDisconnected,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Connected => "CONNECTED",
            MessageType::Welcome => "WELCOME",
            MessageType::Heartbeat => "HEARTBEAT",
            MessageType::StartGame => "START_GAME",
            MessageType::KeyPressed => "KEY_PRESSED",
            MessageType::KeyReleased => "KEY_RELEASED",
            MessageType::Waiting => "WAITING",
            MessageType::UpdateGame => "UPDATE_GAME",
            MessageType::GameEnded => "GAME_ENDED",
            MessageType::UserDisconnected => "USER_DISCONNECTED",
        }
    }
}

impl FromStr for MessageType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONNECTED" => Ok(MessageType::Connected),
            "WELCOME" => Ok(MessageType::Welcome),
            "HEARTBEAT" => Ok(MessageType::Heartbeat),
            "START_GAME" => Ok(MessageType::StartGame),
            "KEY_PRESSED" => Ok(MessageType::KeyPressed),
            "KEY_RELEASED" => Ok(MessageType::KeyReleased),
            "WAITING" => Ok(MessageType::Waiting),
            "UPDATE_GAME" => Ok(MessageType::UpdateGame),
            "GAME_ENDED" => Ok(MessageType::GameEnded),
            "USER_DISCONNECTED" => Ok(MessageType::UserDisconnected),
            _ => Err(()),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw `{type, payload}` frame before its payload is interpreted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// The declared message type, kept as text so unknown types survive parsing
    #[serde(rename = "type")]
    pub kind: String,

    /// Type-dependent payload; absent payloads read as `null`
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    /// Parses a text frame into an envelope.
    pub fn parse(text: &str) -> Result<Self, ServerError> {
        serde_json::from_str(text)
            .map_err(|e| ServerError::Protocol(format!("Invalid envelope: {e}")))
    }

    /// The recognized type of this envelope, or `None` for unknown types.
    pub fn message_type(&self) -> Option<MessageType> {
        self.kind.parse().ok()
    }

    /// Decodes the payload into the shape its type declares.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ServerError> {
        let kind = self.kind;
        serde_json::from_value(self.payload)
            .map_err(|e| ServerError::Protocol(format!("Invalid {kind} payload: {e}")))
    }
}

/// Payload naming a single player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityPayload {
    #[serde(alias = "publicKey")]
    pub identity: String,
}

/// Payload of `KEY_PRESSED` / `KEY_RELEASED`.
///
/// `key` stays textual here; the router checks it against
/// [`InputKey`](super::InputKey) and drops anything outside the set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPayload {
    #[serde(alias = "publicKey")]
    pub identity: String,
    pub key: String,
}

/// One entry of a worker's player roster.
///
/// Only `id` is read by the hub; the rest of the entry (position, energy,
/// cooldowns, trail) rides along untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerDescriptor {
    pub id: String,
    #[serde(flatten)]
    pub state: Map<String, Value>,
}

/// Per-tick game state emitted by a worker with `UPDATE_GAME` or `START_GAME`.
///
/// Serializing this struct produces the reshaped payload sent to players:
/// top-level fields not listed here (worker bookkeeping) are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    #[serde(rename = "gameID")]
    pub game_id: Value,

    pub players: Vec<PlayerDescriptor>,

    #[serde(rename = "energyOrbs", default)]
    pub energy_orbs: Value,

    #[serde(rename = "player_1_keys", default)]
    pub player_1_keys: Value,

    #[serde(rename = "player_2_keys", default)]
    pub player_2_keys: Value,

    #[serde(rename = "gameState", default, skip_serializing_if = "Value::is_null")]
    pub game_state: Value,

    #[serde(rename = "gameTime", default, skip_serializing_if = "Value::is_null")]
    pub game_time: Value,
}

impl GameSnapshot {
    pub fn player_ids(&self) -> impl Iterator<Item = &str> {
        self.players.iter().map(|p| p.id.as_str())
    }
}

/// Identities the worker currently holds in its lobby.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitingList {
    pub players: Vec<String>,
}

/// Final result of a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    #[serde(rename = "gameID")]
    pub game_id: Value,
    pub players: Vec<String>,
    #[serde(default)]
    pub winner: Value,
}

/// Heartbeat sent by the liveness monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    /// Milliseconds since the Unix epoch at send time
    pub timestamp: u64,
}

/// Messages a player connection may send.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerMessage {
    Connected,
    Heartbeat,
    StartGame(IdentityPayload),
    KeyPressed(KeyPayload),
    KeyReleased(KeyPayload),
}

impl PlayerMessage {
    /// Parses a player frame.
    ///
    /// Returns `Ok(None)` for types a player has no business sending, and for
    /// unknown types.
    pub fn parse(text: &str) -> Result<Option<Self>, ServerError> {
        let envelope = Envelope::parse(text)?;
        let Some(kind) = envelope.message_type() else {
            return Ok(None);
        };

        let message = match kind {
            MessageType::Connected => PlayerMessage::Connected,
            MessageType::Heartbeat => PlayerMessage::Heartbeat,
            MessageType::StartGame => PlayerMessage::StartGame(envelope.decode()?),
            MessageType::KeyPressed => PlayerMessage::KeyPressed(envelope.decode()?),
            MessageType::KeyReleased => PlayerMessage::KeyReleased(envelope.decode()?),
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}

/// Messages a worker connection may send.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerMessage {
    Connected,
    UpdateGame(GameSnapshot),
    StartGame(GameSnapshot),
    Waiting(WaitingList),
    GameEnded(GameResult),
}

impl WorkerMessage {
    /// Parses a worker frame. Unknown and player-only types yield `Ok(None)`.
    pub fn parse(text: &str) -> Result<Option<Self>, ServerError> {
        let envelope = Envelope::parse(text)?;
        let Some(kind) = envelope.message_type() else {
            return Ok(None);
        };

        let message = match kind {
            MessageType::Connected => WorkerMessage::Connected,
            MessageType::UpdateGame => WorkerMessage::UpdateGame(envelope.decode()?),
            MessageType::StartGame => WorkerMessage::StartGame(envelope.decode()?),
            MessageType::Waiting => WorkerMessage::Waiting(envelope.decode()?),
            MessageType::GameEnded => WorkerMessage::GameEnded(envelope.decode()?),
            _ => return Ok(None),
        };
        Ok(Some(message))
    }
}

/// Messages the hub originates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    Welcome(String),
    Heartbeat(HeartbeatPayload),
    Waiting(WaitingList),
    UpdateGame(GameSnapshot),
    StartGame(GameSnapshot),
    GameEnded(GameResult),
    UserDisconnected(IdentityPayload),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            ServerMessage::Welcome(_) => MessageType::Welcome,
            ServerMessage::Heartbeat(_) => MessageType::Heartbeat,
            ServerMessage::Waiting(_) => MessageType::Waiting,
            ServerMessage::UpdateGame(_) => MessageType::UpdateGame,
            ServerMessage::StartGame(_) => MessageType::StartGame,
            ServerMessage::GameEnded(_) => MessageType::GameEnded,
            ServerMessage::UserDisconnected(_) => MessageType::UserDisconnected,
        }
    }

    /// Serializes the message into a text frame.
    pub fn to_text(&self) -> Result<String, ServerError> {
        serde_json::to_string(self).map_err(|e| {
            ServerError::Internal(format!("Failed to serialize {}: {e}", self.message_type()))
        })
    }
}
