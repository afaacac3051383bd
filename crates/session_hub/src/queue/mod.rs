//! Matchmaking queue adapter.
//!
//! The hub only ever hands identities off to an external FIFO and peeks at
//! its contents to avoid double-enqueueing a player. Whatever consumes the
//! queue (pairing players, spawning a worker) lives outside this crate and
//! removes each job it takes, so a player can queue again after a match.

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryQueue;
pub use sqlite::{QueueJob, SqliteQueue};

use async_trait::async_trait;
use thiserror::Error;

/// Queue name shared with the external matcher.
pub const DEFAULT_QUEUE_NAME: &str = "waiting-queue";

/// Job name each enqueued identity is filed under.
pub const GAME_WORKER_JOB: &str = "game-worker-job";

/// Failures talking to the queue backend.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Queue unavailable: {0}")]
    Unavailable(String),
    #[error("Queue I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Queue storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("Queue connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Queue task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Narrow contract of the durable FIFO the hub pushes waiting players to.
#[async_trait]
pub trait MatchmakingQueue: Send + Sync {
    /// Appends `identity` to the tail of the queue.
    async fn push(&self, identity: &str) -> Result<(), QueueError>;

    /// Current contents, head first.
    async fn list(&self) -> Result<Vec<String>, QueueError>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}
