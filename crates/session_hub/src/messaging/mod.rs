//! Envelope definitions and the session router.

pub mod keys;
pub mod router;
pub mod types;

pub use keys::InputKey;
pub use router::SessionRouter;
pub use types::{
    Envelope, GameResult, GameSnapshot, HeartbeatPayload, IdentityPayload, KeyPayload,
    MessageType, PlayerDescriptor, PlayerMessage, ServerMessage, WaitingList, WorkerMessage,
};
