//! Listener, accept loop and per-connection handling.

pub mod core;
pub mod handlers;

pub use self::core::HubServer;
pub use handlers::{ConnectParams, ConnectionRole};
