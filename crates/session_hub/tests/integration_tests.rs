//! End-to-end tests driving the hub over real WebSocket connections.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use session_hub::{HubServer, InMemoryQueue, MatchmakingQueue, ServerConfig, SqliteQueue};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const SECRET: &str = "integration-secret";
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

struct TestHub {
    server: Arc<HubServer>,
    queue: Arc<dyn MatchmakingQueue>,
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl TestHub {
    async fn start() -> Self {
        Self::start_with(|config| config).await
    }

    async fn start_with(customize: impl FnOnce(ServerConfig) -> ServerConfig) -> Self {
        Self::start_on(Arc::new(InMemoryQueue::new()), customize).await
    }

    async fn start_on(
        queue: Arc<dyn MatchmakingQueue>,
        customize: impl FnOnce(ServerConfig) -> ServerConfig,
    ) -> Self {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), SECRET)
            .with_heartbeat_interval(Duration::from_secs(3600))
            .with_presence_interval(Duration::ZERO);
        let server = Arc::new(HubServer::new(customize(config), queue.clone()));
        let listener = server.bind().unwrap();
        let addr = listener.local_addr().unwrap();

        let running = server.clone();
        let task = tokio::spawn(async move {
            running.serve(listener).await.unwrap();
        });

        Self {
            server,
            queue,
            addr,
            task,
        }
    }

    async fn player(&self, identity: &str) -> Client {
        let url = format!("ws://{}/?identity={}", self.addr, identity);
        let (ws, _) = connect_async(url).await.unwrap();
        ws
    }

    async fn worker(&self) -> Client {
        let url = format!("ws://{}/?token={}", self.addr, SECRET);
        let (ws, _) = connect_async(url).await.unwrap();
        ws
    }

    /// Waits until the registry reaches the given counts.
    async fn wait_for_counts(&self, players: usize, workers: usize) {
        let registry = self.server.get_registry();
        timeout(RECV_TIMEOUT, async {
            loop {
                if registry.count_players().await == players
                    && registry.count_workers().await == workers
                {
                    return;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("registry never reached the expected counts");
    }

    async fn wait_for_queue(&self, expected: &[&str]) {
        timeout(RECV_TIMEOUT, async {
            loop {
                if self.queue.list().await.unwrap() == expected {
                    return;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("queue never reached the expected contents");
    }

    async fn stop(self) {
        self.server.shutdown();
        timeout(RECV_TIMEOUT, self.task).await.unwrap().unwrap();
    }
}

async fn send(ws: &mut Client, value: Value) {
    ws.send(Message::text(value.to_string())).await.unwrap();
}

/// Next text frame as JSON, skipping control frames.
async fn recv_json(ws: &mut Client) -> Value {
    timeout(RECV_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return serde_json::from_str::<Value>(text.as_str()).unwrap(),
                Some(Ok(Message::Close(_))) | None => panic!("connection closed while waiting"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("websocket error: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a frame")
}

async fn recv_raw(ws: &mut Client) -> String {
    timeout(RECV_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                Some(Ok(Message::Close(_))) | None => panic!("connection closed while waiting"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("websocket error: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a frame")
}

/// Asserts no text frame arrives within a short window.
async fn assert_silent(ws: &mut Client) {
    let result = timeout(Duration::from_millis(200), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return Some(text.as_str().to_string()),
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return None,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    if let Ok(Some(text)) = result {
        panic!("unexpected frame: {text}");
    }
}

/// Reads until the peer closes. Returns false on timeout.
async fn closed_by_peer(ws: &mut Client) -> bool {
    timeout(RECV_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .is_ok()
}

#[tokio::test]
async fn test_connected_gets_welcome() {
    let hub = TestHub::start_with(|c| c.with_welcome_message("hello there")).await;
    let mut alice = hub.player("alice").await;

    send(&mut alice, json!({"type": "CONNECTED"})).await;
    assert_eq!(
        recv_json(&mut alice).await,
        json!({"type": "WELCOME", "payload": "hello there"})
    );

    hub.stop().await;
}

#[tokio::test]
async fn test_matchmaking_and_waiting_fan_out() {
    let hub = TestHub::start().await;
    let mut alice = hub.player("alice").await;
    let mut bob = hub.player("bob").await;

    send(&mut alice, json!({"type": "START_GAME", "payload": {"identity": "alice"}})).await;
    hub.wait_for_queue(&["alice"]).await;
    send(&mut bob, json!({"type": "START_GAME", "payload": {"identity": "bob"}})).await;
    hub.wait_for_queue(&["alice", "bob"]).await;

    // A repeated request does not enqueue twice.
    send(&mut alice, json!({"type": "START_GAME", "payload": {"identity": "alice"}})).await;

    let mut worker = hub.worker().await;
    hub.wait_for_counts(2, 1).await;
    send(
        &mut worker,
        json!({"type": "WAITING", "payload": {"players": ["alice", "bob"]}}),
    )
    .await;

    let expected = json!({"type": "WAITING", "payload": {"players": ["alice", "bob"]}});
    assert_eq!(recv_json(&mut alice).await, expected);
    assert_eq!(recv_json(&mut bob).await, expected);
    assert_silent(&mut alice).await;
    assert_eq!(hub.queue.list().await.unwrap(), vec!["alice", "bob"]);

    hub.stop().await;
}

#[tokio::test]
async fn test_sqlite_queue_requeue_after_match_and_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("matchmaking.db");
    let queue = Arc::new(SqliteQueue::open(&path).await.unwrap());
    let hub = TestHub::start_on(queue.clone(), |c| c).await;
    let mut alice = hub.player("alice").await;
    let start = json!({"type": "START_GAME", "payload": {"identity": "alice"}});

    send(&mut alice, start.clone()).await;
    hub.wait_for_queue(&["alice"]).await;

    // The matcher takes the job; a later request must queue alice again.
    assert_eq!(queue.pop_front().await.unwrap().unwrap().data, "alice");
    hub.wait_for_queue(&[]).await;
    send(&mut alice, start).await;
    hub.wait_for_queue(&["alice"]).await;

    hub.stop().await;
    drop(queue);

    let reopened = SqliteQueue::open(&path).await.unwrap();
    assert_eq!(reopened.list().await.unwrap(), vec!["alice"]);
}

#[tokio::test]
async fn test_key_event_forwarded_verbatim_to_workers() {
    let hub = TestHub::start().await;
    let mut worker_a = hub.worker().await;
    let mut worker_b = hub.worker().await;
    let mut alice = hub.player("alice").await;
    hub.wait_for_counts(1, 2).await;

    let frame = r#"{"type":"KEY_PRESSED","payload":{"identity":"alice","key":"ArrowUp"}}"#;
    alice.send(Message::text(frame)).await.unwrap();
    assert_eq!(recv_raw(&mut worker_a).await, frame);
    assert_eq!(recv_raw(&mut worker_b).await, frame);

    // Keys outside the set are dropped.
    send(
        &mut alice,
        json!({"type": "KEY_RELEASED", "payload": {"identity": "alice", "key": "KeyQ"}}),
    )
    .await;
    assert_silent(&mut worker_a).await;

    hub.stop().await;
}

#[tokio::test]
async fn test_update_game_delivered_without_extra_fields() {
    let hub = TestHub::start().await;
    let mut alice = hub.player("alice").await;
    let mut bob = hub.player("bob").await;
    let mut worker = hub.worker().await;
    hub.wait_for_counts(2, 1).await;

    send(
        &mut worker,
        json!({
            "type": "UPDATE_GAME",
            "payload": {
                "gameID": 7,
                "players": [{"id": "alice", "x": 1}, {"id": "bob", "x": 2}],
                "energyOrbs": [],
                "player_1_keys": {},
                "player_2_keys": {},
                "workerBookkeeping": true
            }
        }),
    )
    .await;

    let update = recv_json(&mut alice).await;
    assert_eq!(update["type"], "UPDATE_GAME");
    assert_eq!(update["payload"]["gameID"], 7);
    assert_eq!(update["payload"]["players"][1], json!({"id": "bob", "x": 2}));
    assert!(update["payload"].get("workerBookkeeping").is_none());
    assert_eq!(recv_json(&mut bob).await, update);

    hub.stop().await;
}

#[tokio::test]
async fn test_duplicate_login_replaces_old_socket() {
    let hub = TestHub::start().await;
    let mut first = hub.player("alice").await;
    hub.wait_for_counts(1, 0).await;
    let mut second = hub.player("alice").await;

    assert!(closed_by_peer(&mut first).await);
    hub.wait_for_counts(1, 0).await;

    let mut worker = hub.worker().await;
    hub.wait_for_counts(1, 1).await;
    send(
        &mut worker,
        json!({"type": "WAITING", "payload": {"players": ["alice"]}}),
    )
    .await;
    assert_eq!(recv_json(&mut second).await["type"], "WAITING");

    hub.stop().await;
}

#[tokio::test]
async fn test_disconnect_notifies_workers() {
    let hub = TestHub::start().await;
    let mut worker = hub.worker().await;
    let mut alice = hub.player("alice").await;
    hub.wait_for_counts(1, 1).await;

    alice.close(None).await.unwrap();
    assert_eq!(
        recv_json(&mut worker).await,
        json!({"type": "USER_DISCONNECTED", "payload": {"identity": "alice"}})
    );
    hub.wait_for_counts(0, 1).await;

    hub.stop().await;
}

#[tokio::test]
async fn test_handshake_without_credentials_is_refused() {
    let hub = TestHub::start().await;

    let url = format!("ws://{}/", hub.addr);
    match connect_async(url).await {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 401),
        other => panic!("expected HTTP 401, got {:?}", other.map(|_| ())),
    }

    let url = format!("ws://{}/?token=wrong", hub.addr);
    assert!(connect_async(url).await.is_err());

    hub.stop().await;
}

#[tokio::test]
async fn test_connection_limit_enforced() {
    let hub = TestHub::start_with(|c| c.with_max_connections(1)).await;
    let _alice = hub.player("alice").await;
    hub.wait_for_counts(1, 0).await;

    let url = format!("ws://{}/?identity=bob", hub.addr);
    match connect_async(url).await {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 503),
        other => panic!("expected HTTP 503, got {:?}", other.map(|_| ())),
    }

    hub.stop().await;
}

#[tokio::test]
async fn test_reconnect_at_connection_limit_replaces_socket() {
    let hub = TestHub::start_with(|c| c.with_max_connections(1)).await;
    let mut first = hub.player("alice").await;
    hub.wait_for_counts(1, 0).await;

    let mut second = hub.player("alice").await;
    assert!(closed_by_peer(&mut first).await);
    hub.wait_for_counts(1, 0).await;

    send(&mut second, json!({"type": "CONNECTED"})).await;
    assert_eq!(recv_json(&mut second).await["type"], "WELCOME");

    let url = format!("ws://{}/?identity=bob", hub.addr);
    match connect_async(url).await {
        Err(WsError::Http(response)) => assert_eq!(response.status().as_u16(), 503),
        other => panic!("expected HTTP 503, got {:?}", other.map(|_| ())),
    }

    hub.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_open_sockets() {
    let hub = TestHub::start().await;
    let mut alice = hub.player("alice").await;
    hub.wait_for_counts(1, 0).await;

    hub.server.shutdown();
    assert!(closed_by_peer(&mut alice).await);
    timeout(RECV_TIMEOUT, hub.task).await.unwrap().unwrap();
}
