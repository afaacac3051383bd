//! Per-connection handling: handshake classification, the writer task, and
//! the read loop that feeds the router.

use crate::config::ServerConfig;
use crate::connection::{ConnectionHandle, OutboundFrame};
use crate::error::ServerError;
use crate::messaging::SessionRouter;
use futures::{SinkExt, StreamExt};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// What a socket turned out to be after the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionRole {
    Player { identity: String },
    Worker,
}

impl ConnectionRole {
    pub fn label(&self) -> String {
        match self {
            ConnectionRole::Player { identity } => format!("player '{identity}'"),
            ConnectionRole::Worker => "worker".to_string(),
        }
    }

    /// Whether accepting this role leaves the connection count unchanged,
    /// which is the case for a player taking over its own identity.
    fn replaces_existing(&self, registered: &HashSet<String>) -> bool {
        match self {
            ConnectionRole::Player { identity } => registered.contains(identity),
            ConnectionRole::Worker => false,
        }
    }
}

/// Connection-establishment parameters read from the handshake URI query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    pub token: Option<String>,
    pub identity: Option<String>,
}

impl ConnectParams {
    /// Parses `token` and `identity` (alias `publicKey`) from a query string.
    pub fn from_query(query: Option<&str>) -> Self {
        let mut params = Self::default();
        let Some(query) = query else {
            return params;
        };

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "token" => params.token = Some(value.into_owned()),
                "identity" | "publicKey" => params.identity = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// A matching worker secret wins; otherwise a non-empty identity makes a
    /// player. Anything else is refused.
    pub fn classify(self, worker_secret: &str) -> Option<ConnectionRole> {
        if let Some(token) = self.token {
            if !worker_secret.is_empty() && token == worker_secret {
                return Some(ConnectionRole::Worker);
            }
        }

        self.identity
            .filter(|identity| !identity.is_empty())
            .map(|identity| ConnectionRole::Player { identity })
    }
}

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

/// Drives one accepted TCP stream until either side closes it.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    router: Arc<SessionRouter>,
    config: Arc<ServerConfig>,
) -> Result<(), ServerError> {
    let registry = router.registry().clone();
    // At the limit, only identities already holding a slot may connect.
    let full_with = if registry.connection_count().await >= config.max_connections {
        Some(registry.player_identities().await)
    } else {
        None
    };

    let mut role = None;
    let callback = |request: &Request, response: Response| {
        let Some(classified) =
            ConnectParams::from_query(request.uri().query()).classify(&config.worker_secret)
        else {
            return Err(reject(StatusCode::UNAUTHORIZED, "Missing identity or worker token"));
        };
        if let Some(registered) = &full_with {
            if !classified.replaces_existing(registered) {
                return Err(reject(StatusCode::SERVICE_UNAVAILABLE, "Server is full"));
            }
        }
        role = Some(classified);
        Ok(response)
    };

    let ws_stream = accept_hdr_async(stream, callback)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed for {addr}: {e}")))?;
    let role = role.ok_or_else(|| {
        ServerError::Internal(format!("Handshake for {addr} completed without a role"))
    })?;

    let (mut ws_sink, mut ws_receiver) = ws_stream.split();
    let (handle, mut outbound) = ConnectionHandle::new(addr);
    let connection_id = handle.id();

    let writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            match frame {
                OutboundFrame::Text(text) => {
                    if let Err(e) = ws_sink.send(Message::text(text)).await {
                        debug!("Write to {} failed: {}", connection_id, e);
                        break;
                    }
                }
                OutboundFrame::Close => {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
        let _ = ws_sink.close().await;
    });

    match &role {
        ConnectionRole::Player { identity } => {
            registry.add_player(handle.clone(), identity.clone()).await
        }
        ConnectionRole::Worker => registry.add_worker(handle.clone()).await,
    }
    info!(
        "🔗 Connection {} from {} established as {}",
        connection_id,
        addr,
        role.label()
    );

    loop {
        let frame = tokio::select! {
            _ = handle.closed() => {
                debug!("Connection {} closed by the hub", connection_id);
                break;
            }
            frame = ws_receiver.next() => frame,
        };

        match frame {
            Some(Ok(Message::Text(text))) => {
                let result = match &role {
                    ConnectionRole::Player { identity } => {
                        router
                            .route_player_message(&handle, identity, text.as_str())
                            .await
                    }
                    ConnectionRole::Worker => {
                        router.route_worker_message(&handle, text.as_str()).await
                    }
                };
                if let Err(e) = result {
                    warn!("⚠️ Error handling message from {}: {}", connection_id, e);
                }
            }
            Some(Ok(Message::Close(_))) => {
                info!("Connection {} requested close", connection_id);
                break;
            }
            Some(Ok(Message::Binary(_))) => {
                warn!("Ignoring binary frame from {}", connection_id);
            }
            // Pings are answered by tungstenite itself.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("WebSocket error for connection {}: {}", connection_id, e);
                break;
            }
            None => break,
        }
    }

    match &role {
        ConnectionRole::Player { .. } => {
            registry.remove_player(connection_id).await;
        }
        ConnectionRole::Worker => {
            registry.remove_worker(connection_id).await;
        }
    }

    handle.close();
    if timeout(Duration::from_secs(5), writer).await.is_err() {
        debug!("Writer for {} did not finish in time", connection_id);
    }
    info!("Connection {} from {} closed", connection_id, addr);
    Ok(())
}
