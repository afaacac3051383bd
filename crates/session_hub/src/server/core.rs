//! Core hub server implementation.
//!
//! `HubServer` owns the registry and router, binds the listening socket and
//! runs the accept loop until shutdown is requested.

use crate::{
    config::ServerConfig,
    connection::ConnectionRegistry,
    error::ServerError,
    messaging::SessionRouter,
    queue::MatchmakingQueue,
    server::handlers::handle_connection,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// The session hub.
///
/// Player and worker sockets share one listener; the handshake decides which
/// class a socket belongs to. All routing state lives in the
/// [`ConnectionRegistry`], which the [`SessionRouter`] consults for every
/// inbound frame.
pub struct HubServer {
    config: Arc<ServerConfig>,
    registry: Arc<ConnectionRegistry>,
    router: Arc<SessionRouter>,
    queue: Arc<dyn MatchmakingQueue>,
    /// Flipped to `true` once; a late subscriber still sees the latest value.
    shutdown_sender: watch::Sender<bool>,
}

impl HubServer {
    pub fn new(config: ServerConfig, queue: Arc<dyn MatchmakingQueue>) -> Self {
        let registry = Arc::new(ConnectionRegistry::new(
            config.heartbeat_interval,
            config.activity_window,
        ));
        let router = Arc::new(SessionRouter::new(
            registry.clone(),
            queue.clone(),
            config.welcome_message.clone(),
        ));
        let (shutdown_sender, _) = watch::channel(false);

        Self {
            config: Arc::new(config),
            registry,
            router,
            queue,
            shutdown_sender,
        }
    }

    /// Binds the configured address with `SO_REUSEADDR` set.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn bind(&self) -> Result<TcpListener, ServerError> {
        let address = self.config.bind_address;
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
        socket.set_reuse_address(true).ok();

        socket
            .bind(&address.into())
            .map_err(|e| ServerError::Network(format!("Bind failed: {e}")))?;
        socket
            .listen(1024)
            .map_err(|e| ServerError::Network(format!("Listen failed: {e}")))?;

        let std_listener: StdTcpListener = socket.into();
        std_listener
            .set_nonblocking(true)
            .map_err(|e| ServerError::Network(format!("Failed to set non-blocking: {e}")))?;

        let listener = TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))?;
        info!("✅ Listener bound on {}", address);
        Ok(listener)
    }

    /// Binds and serves until [`shutdown`](Self::shutdown) is called.
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Runs the accept loop on an already-bound listener.
    ///
    /// On shutdown every open socket is closed before this returns.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Listener has no local address: {e}")))?;
        info!("🚀 Session hub listening on {}", local_addr);
        info!("📦 Matchmaking queue: '{}'", self.queue.name());

        let presence = self.start_presence_reporter();
        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        loop {
            if *shutdown_receiver.borrow() {
                break;
            }

            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        debug!("Accepted TCP connection from {}", addr);
                        let router = self.router.clone();
                        let config = self.config.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, router, config).await {
                                error!("Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                    }
                },
                changed = shutdown_receiver.changed() => {
                    if changed.is_err() || *shutdown_receiver.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        info!("🧹 Performing server cleanup...");
        if let Some(task) = presence {
            task.abort();
        }
        self.registry.shutdown_all().await;
        info!("Server stopped");
        Ok(())
    }

    /// Requests a graceful stop of [`serve`](Self::serve).
    pub fn shutdown(&self) {
        info!("🛑 Shutdown requested");
        self.shutdown_sender.send_replace(true);
    }

    pub fn get_registry(&self) -> Arc<ConnectionRegistry> {
        self.registry.clone()
    }

    pub fn get_router(&self) -> Arc<SessionRouter> {
        self.router.clone()
    }

    pub fn get_queue(&self) -> Arc<dyn MatchmakingQueue> {
        self.queue.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn bind_address(&self) -> SocketAddr {
        self.config.bind_address
    }

    /// Logs registry counts every `presence_interval`. Disabled when the
    /// interval is zero.
    fn start_presence_reporter(&self) -> Option<JoinHandle<()>> {
        let period = self.config.presence_interval;
        if period.is_zero() {
            info!("⏸️ Presence reporting disabled");
            return None;
        }

        let registry = self.registry.clone();
        Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let stats = registry.stats().await;
                info!(
                    "📊 Presence: {} player(s) ({} active), {} worker(s)",
                    stats.players, stats.active_players, stats.workers
                );
            }
        }))
    }
}
