//! Per-player keepalive.
//!
//! Every registered player gets a [`KeepaliveTask`] that sends a `HEARTBEAT`
//! frame at a fixed period while the socket is open. The task never closes a
//! socket; staleness is only reported through
//! [`ConnectionRegistry::list_active_players`](crate::ConnectionRegistry::list_active_players).

use crate::connection::ConnectionHandle;
use crate::messaging::{HeartbeatPayload, ServerMessage};
use crate::utils::current_timestamp_millis;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tracing::debug;

/// A running keepalive timer bound to one connection.
///
/// Dropping the guard aborts the timer, so whoever owns the player record
/// also owns the timer's lifetime.
#[derive(Debug)]
pub struct KeepaliveTask {
    task: JoinHandle<()>,
}

impl KeepaliveTask {
    /// Starts sending heartbeats to `connection` every `period`.
    ///
    /// The first heartbeat goes out one full period after the call.
    pub fn spawn(connection: ConnectionHandle, period: Duration) -> Self {
        let period = period.max(Duration::from_millis(1));
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !connection.is_open() {
                    break;
                }

                let heartbeat = ServerMessage::Heartbeat(HeartbeatPayload {
                    timestamp: current_timestamp_millis(),
                });
                if let Err(e) = connection.send_message(&heartbeat) {
                    debug!("💓 Keepalive for {} stopped: {}", connection.id(), e);
                    break;
                }
            }
        });

        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the timer now. Equivalent to dropping the guard.
    pub fn cancel(self) {}
}

impl Drop for KeepaliveTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}
