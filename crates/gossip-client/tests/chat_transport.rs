//! Room socket behaviour against an in-process WebSocket server.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::{
    Router,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use chrono::DateTime;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;

use gossip_client::{ChatConfig, ChatError, ChatRoom, ConnectionState, ReconnectPolicy};

#[derive(Clone, Copy)]
enum Mode {
    /// Stamp each frame with the sender and echo it back
    Echo,
    /// Send one malformed frame, then a valid one, then echo
    Garbage,
    /// Hang up on the first connection only
    DropFirst,
    /// Hang up on every connection
    DropAlways,
}

#[derive(Clone)]
struct ChatServer {
    mode: Mode,
    connects: Arc<AtomicUsize>,
    params: mpsc::UnboundedSender<HashMap<String, String>>,
    frames: mpsc::UnboundedSender<String>,
}

struct Harness {
    ws_url: String,
    connects: Arc<AtomicUsize>,
    params: mpsc::UnboundedReceiver<HashMap<String, String>>,
    frames: mpsc::UnboundedReceiver<String>,
}

async fn connect(
    State(server): State<ChatServer>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let index = server.connects.fetch_add(1, Ordering::SeqCst);
    let _ = server.params.send(params.clone());
    ws.on_upgrade(move |socket| session(socket, server, params, index))
}

async fn session(mut socket: WebSocket, server: ChatServer, params: HashMap<String, String>, index: usize) {
    let hang_up = match server.mode {
        Mode::DropAlways => true,
        Mode::DropFirst => index == 0,
        _ => false,
    };
    if hang_up {
        let _ = socket.send(Message::Close(None)).await;
        return;
    }

    if let Mode::Garbage = server.mode {
        let _ = socket.send(Message::Text("not json".into())).await;
        let valid = r#"{"roomId":"R1","userId":"U2","username":"bob","body":"hey","timestamp":"2024-05-01T10:00:00Z"}"#;
        let _ = socket.send(Message::Text(valid.into())).await;
    }

    let username = params.get("username").cloned().unwrap_or_default();
    while let Some(Ok(msg)) = socket.recv().await {
        if let Message::Text(text) = msg {
            let raw = text.as_str().to_owned();
            let _ = server.frames.send(raw.clone());

            let mut value: Value = serde_json::from_str(&raw).unwrap();
            value["userId"] = Value::from(format!("id-{}", username));
            value["username"] = Value::from(username.clone());
            if socket
                .send(Message::Text(value.to_string().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    }
}

async fn harness(mode: Mode) -> Harness {
    let (params_tx, params_rx) = mpsc::unbounded_channel();
    let (frames_tx, frames_rx) = mpsc::unbounded_channel();
    let connects = Arc::new(AtomicUsize::new(0));
    let state = ChatServer {
        mode,
        connects: connects.clone(),
        params: params_tx,
        frames: frames_tx,
    };
    let app = Router::new()
        .route("/rooms/connect", get(connect))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Harness {
        ws_url: format!("ws://{}", addr),
        connects,
        params: params_rx,
        frames: frames_rx,
    }
}

fn fast_reconnect() -> ReconnectPolicy {
    ReconnectPolicy {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(10),
        max_backoff: Duration::from_millis(50),
    }
}

#[tokio::test]
async fn joining_opens_one_socket_for_room_and_user() {
    let mut h = harness(Mode::Echo).await;

    let room = ChatRoom::join(ChatConfig::new(&h.ws_url), "R1", "alice")
        .await
        .unwrap();

    let params = h.params.recv().await.unwrap();
    assert_eq!(params.get("roomId").map(String::as_str), Some("R1"));
    assert_eq!(params.get("username").map(String::as_str), Some("alice"));
    assert_eq!(h.connects.load(Ordering::SeqCst), 1);
    assert_eq!(room.state(), ConnectionState::Open);
    assert!(room.url().as_str().contains("roomId=R1"));

    room.close().await;
    assert_eq!(h.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn send_emits_exactly_one_frame() {
    let mut h = harness(Mode::Echo).await;
    let room = ChatRoom::join(ChatConfig::new(&h.ws_url), "R1", "alice")
        .await
        .unwrap();

    room.send("hello").unwrap();

    let frame = timeout(Duration::from_secs(2), h.frames.recv())
        .await
        .unwrap()
        .unwrap();
    let value: Value = serde_json::from_str(&frame).unwrap();
    let obj = value.as_object().unwrap();
    let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
    keys.sort();
    assert_eq!(keys, vec!["body", "roomId", "timestamp"]);
    assert_eq!(obj["roomId"], "R1");
    assert_eq!(obj["body"], "hello");
    assert!(DateTime::parse_from_rfc3339(obj["timestamp"].as_str().unwrap()).is_ok());

    assert!(
        timeout(Duration::from_millis(200), h.frames.recv())
            .await
            .is_err(),
        "a second frame was sent"
    );
}

#[tokio::test]
async fn empty_body_sends_nothing() {
    let mut h = harness(Mode::Echo).await;
    let room = ChatRoom::join(ChatConfig::new(&h.ws_url), "R1", "alice")
        .await
        .unwrap();

    assert!(matches!(room.send(""), Err(ChatError::EmptyBody)));
    assert!(
        timeout(Duration::from_millis(200), h.frames.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn received_messages_are_logged_in_order() {
    let h = harness(Mode::Echo).await;
    let mut room = ChatRoom::join(ChatConfig::new(&h.ws_url), "R1", "alice")
        .await
        .unwrap();

    room.send("one").unwrap();
    room.send("two").unwrap();

    let first = timeout(Duration::from_secs(2), room.recv()).await.unwrap().unwrap();
    let second = timeout(Duration::from_secs(2), room.recv()).await.unwrap().unwrap();

    assert_eq!(first.body, "one");
    assert_eq!(second.body, "two");
    assert_eq!(first.username.as_deref(), Some("alice"));
    assert_eq!(first.user_id.as_deref(), Some("id-alice"));
    assert_eq!(room.log().len(), 2);
    assert_eq!(room.log()[1].body, "two");
}

#[tokio::test]
async fn malformed_frames_are_skipped() {
    let h = harness(Mode::Garbage).await;
    let mut room = ChatRoom::join(ChatConfig::new(&h.ws_url), "R1", "alice")
        .await
        .unwrap();

    let message = timeout(Duration::from_secs(2), room.recv()).await.unwrap().unwrap();
    assert_eq!(message.author(), "bob");
    assert_eq!(room.log().len(), 1);
}

#[tokio::test]
async fn dropped_socket_reconnects() {
    let mut h = harness(Mode::DropFirst).await;
    let config = ChatConfig::new(&h.ws_url).with_reconnect(fast_reconnect());
    let room = ChatRoom::join(config, "R1", "alice").await.unwrap();

    timeout(Duration::from_secs(5), async {
        while h.connects.load(Ordering::SeqCst) < 2 || room.state() != ConnectionState::Open {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("room never reconnected");

    // both connections targeted the same room
    for _ in 0..2 {
        let params = h.params.recv().await.unwrap();
        assert_eq!(params.get("roomId").map(String::as_str), Some("R1"));
    }

    room.send("back").unwrap();
    let frame = timeout(Duration::from_secs(2), h.frames.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(frame.contains("\"back\""));
}

#[tokio::test]
async fn drop_without_reconnect_is_terminal() {
    let h = harness(Mode::DropAlways).await;
    let config = ChatConfig::new(&h.ws_url).with_reconnect(ReconnectPolicy::disabled());
    let mut room = ChatRoom::join(config, "R1", "alice").await.unwrap();

    timeout(Duration::from_secs(2), room.closed())
        .await
        .expect("room never closed");

    assert_eq!(room.state(), ConnectionState::Closed);
    assert!(matches!(room.send("hello"), Err(ChatError::NotConnected)));
    assert!(room.recv().await.is_none());
    assert_eq!(h.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exhausted_reconnects_close_the_room() {
    let h = harness(Mode::DropAlways).await;
    let config = ChatConfig::new(&h.ws_url).with_reconnect(fast_reconnect());
    let mut room = ChatRoom::join(config, "R1", "alice").await.unwrap();

    timeout(Duration::from_secs(5), room.closed())
        .await
        .expect("room never gave up");

    // initial connection plus three attempts
    assert_eq!(h.connects.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn join_fails_when_server_is_down() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let res = ChatRoom::join(ChatConfig::new(format!("ws://{}", addr)), "R1", "alice").await;
    assert!(matches!(res, Err(ChatError::Connect { .. })));
}
