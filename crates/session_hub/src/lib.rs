//! # Session Hub
//!
//! Real-time routing hub for a two-party arcade game. The hub sits between
//! browser clients, an external matchmaking queue and a pool of simulation
//! workers. It does not simulate anything itself.
//!
//! ## Responsibilities
//!
//! * **Connection classification** - every WebSocket handshake is classified
//!   as a *player* (carries an `identity`) or a *worker* (carries a `token`
//!   equal to the configured worker secret)
//! * **Player registry** - at most one live socket per identity; a newer login
//!   replaces and closes the older one
//! * **Matchmaking hand-off** - `START_GAME` from a player pushes its identity
//!   onto the queue exactly once
//! * **Input forwarding** - whitelisted `KEY_PRESSED` / `KEY_RELEASED` frames go
//!   verbatim to every worker
//! * **State fan-out** - `UPDATE_GAME`, `START_GAME`, `WAITING` and `GAME_ENDED`
//!   from workers are delivered to the players they name
//! * **Liveness** - a per-player `HEARTBEAT` keepalive plus an activity clock
//!   that decides which players count as active
//!
//! ## Message Flow
//!
//! 1. A client sends a text frame shaped `{"type": ..., "payload": ...}`
//! 2. The frame is parsed into an [`Envelope`](messaging::Envelope) and then
//!    into the typed message for its connection class
//! 3. The [`SessionRouter`] acts on it against the [`ConnectionRegistry`]
//!    and the [`MatchmakingQueue`]
//! 4. Replies go out through each socket's [`ConnectionHandle`]
//!
//! Unknown message types are ignored. Malformed frames surface as
//! [`ServerError::Protocol`] and are logged without closing the socket.
//!
//! ## Thread Safety
//!
//! The registry keeps players and workers behind `tokio::sync::RwLock`s and
//! never holds a lock across a send. Sends are non-blocking pushes onto each
//! socket's writer task.

pub use config::ServerConfig;
pub use connection::{ConnectionHandle, ConnectionId, ConnectionRegistry, RegistryStats};
pub use error::ServerError;
pub use messaging::SessionRouter;
pub use queue::{InMemoryQueue, MatchmakingQueue, QueueError, QueueJob, SqliteQueue};
pub use server::HubServer;
pub use utils::{create_server, create_server_with_config, create_server_with_queue};

pub mod config;
pub mod connection;
pub mod error;
pub mod liveness;
pub mod messaging;
pub mod queue;
pub mod server;
pub mod utils;
