use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use reqwest::Url;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::form_urlencoded;

use gossip_types::events::ChatMessage;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("could not connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: Box<tungstenite::Error>,
    },

    #[error("invalid chat url: {0}")]
    InvalidUrl(String),

    #[error("message body is empty")]
    EmptyBody,

    #[error("chat socket is not connected")]
    NotConnected,

    #[error("could not encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// How a dropped room socket is re-established.
///
/// Delays double from `initial_backoff` up to `max_backoff`. Attempts count
/// consecutive connections that carried no traffic; any frame in either
/// direction resets the count. With `max_attempts == 0` a drop is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before reconnect `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base WebSocket URL, e.g. `ws://127.0.0.1:3000`.
    pub ws_url: String,
    pub reconnect: ReconnectPolicy,
}

impl ChatConfig {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Reconnecting { attempt: u32 },
    Closed,
}

const CONNECT_SEGMENTS: [&str; 2] = ["rooms", "connect"];

fn connect_query(room_id: &str, username: &str) -> String {
    form_urlencoded::Serializer::new(String::new())
        .append_pair("roomId", room_id)
        .append_pair("username", username)
        .finish()
}

/// Target of the room socket: `<base>/rooms/connect?roomId=..&username=..`.
pub fn connect_url(ws_url: &str, room_id: &str, username: &str) -> Result<Url, ChatError> {
    let mut url = Url::parse(ws_url).map_err(|e| ChatError::InvalidUrl(format!("{}: {}", ws_url, e)))?;
    url.path_segments_mut()
        .map_err(|_| ChatError::InvalidUrl(ws_url.to_string()))?
        .pop_if_empty()
        .extend(CONNECT_SEGMENTS);
    url.set_query(Some(&connect_query(room_id, username)));
    Ok(url)
}

/// Host-relative form of [`connect_url`], for pages served on the chat host.
pub fn connect_path(room_id: &str, username: &str) -> String {
    format!("/{}?{}", CONNECT_SEGMENTS.join("/"), connect_query(room_id, username))
}

async fn open(url: &Url) -> Result<Socket, ChatError> {
    let (socket, _) = connect_async(url.as_str())
        .await
        .map_err(|e| ChatError::Connect {
            url: url.to_string(),
            source: Box::new(e),
        })?;
    Ok(socket)
}

/// A joined chat room: one WebSocket, owned by a background task.
///
/// Sending is fire-and-forget. Received messages are appended to the room's
/// display log as they are read.
pub struct ChatRoom {
    room_id: String,
    username: String,
    url: Url,
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<ChatMessage>,
    state: watch::Receiver<ConnectionState>,
    log: Vec<ChatMessage>,
    task: JoinHandle<()>,
}

impl ChatRoom {
    /// Open the room socket. Fails if the first connection cannot be made.
    pub async fn join(
        config: ChatConfig,
        room_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<Self, ChatError> {
        let room_id = room_id.into();
        let username = username.into();
        let url = connect_url(&config.ws_url, &room_id, &username)?;

        let socket = open(&url).await?;
        info!(room = %room_id, %username, "joined chat room");

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Open);

        let connection = Connection {
            url: url.clone(),
            reconnect: config.reconnect,
            outbound: outbound_rx,
            inbound: inbound_tx,
            state: state_tx,
            failures: 0,
        };
        let task = tokio::spawn(connection.run(socket));

        Ok(Self {
            room_id,
            username,
            url,
            outbound: outbound_tx,
            inbound: inbound_rx,
            state: state_rx,
            log: Vec::new(),
            task,
        })
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Queue one frame carrying `body`. Empty bodies are rejected.
    pub fn send(&self, body: &str) -> Result<ChatMessage, ChatError> {
        if body.is_empty() {
            return Err(ChatError::EmptyBody);
        }
        if self.state() != ConnectionState::Open {
            return Err(ChatError::NotConnected);
        }

        let message = ChatMessage::outbound(self.room_id.as_str(), body);
        let frame = serde_json::to_string(&message)?;
        self.outbound
            .send(frame)
            .map_err(|_| ChatError::NotConnected)?;
        Ok(message)
    }

    /// Next inbound message; `None` once the connection is gone for good.
    pub async fn recv(&mut self) -> Option<ChatMessage> {
        let message = self.inbound.recv().await?;
        self.log.push(message.clone());
        Some(message)
    }

    /// Messages received so far, oldest first.
    pub fn log(&self) -> &[ChatMessage] {
        &self.log
    }

    /// Wait until the connection task has given up or been closed.
    pub async fn closed(&mut self) {
        let _ = self
            .state
            .wait_for(|s| *s == ConnectionState::Closed)
            .await;
    }

    /// Send a close frame and wait for the connection task to finish.
    pub async fn close(self) {
        let Self {
            room_id,
            outbound,
            inbound,
            task,
            ..
        } = self;
        drop(outbound);
        drop(inbound);
        if let Err(e) = task.await {
            warn!(room = %room_id, "chat task ended abnormally: {}", e);
        }
        info!(room = %room_id, "left chat room");
    }
}

enum LoopExit {
    /// The room handle went away; the socket was closed on purpose
    Left,
    /// The socket failed or the server hung up
    Dropped,
}

struct Connection {
    url: Url,
    reconnect: ReconnectPolicy,
    outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<ChatMessage>,
    state: watch::Sender<ConnectionState>,
    failures: u32,
}

impl Connection {
    async fn run(mut self, socket: Socket) {
        let mut socket = socket;
        loop {
            let (mut sink, mut stream) = socket.split();
            match self.pump(&mut sink, &mut stream).await {
                LoopExit::Left => break,
                LoopExit::Dropped => match self.reestablish().await {
                    Some(next) => socket = next,
                    None => break,
                },
            }
        }
        self.state.send_replace(ConnectionState::Closed);
        debug!(url = %self.url, "chat connection task finished");
    }

    async fn pump(
        &mut self,
        sink: &mut SplitSink<Socket, Message>,
        stream: &mut SplitStream<Socket>,
    ) -> LoopExit {
        loop {
            tokio::select! {
                frame = self.outbound.recv() => {
                    let Some(text) = frame else {
                        let _ = sink.send(Message::Close(None)).await;
                        return LoopExit::Left;
                    };
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        warn!("chat send failed: {}", e);
                        return LoopExit::Dropped;
                    }
                    self.failures = 0;
                }
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            self.failures = 0;
                            match serde_json::from_str::<ChatMessage>(&text) {
                                Ok(message) => {
                                    let _ = self.inbound.send(message);
                                }
                                Err(e) => {
                                    let raw: String = text.chars().take(200).collect();
                                    warn!("bad chat frame: {} -- raw: {}", e, raw);
                                }
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            info!(?frame, "server closed chat socket");
                            return LoopExit::Dropped;
                        }
                        Some(Ok(_)) => self.failures = 0,
                        Some(Err(e)) => {
                            warn!("chat socket error: {}", e);
                            return LoopExit::Dropped;
                        }
                        None => return LoopExit::Dropped,
                    }
                }
            }
        }
    }

    async fn reestablish(&mut self) -> Option<Socket> {
        while self.failures < self.reconnect.max_attempts {
            if self.inbound.is_closed() {
                return None;
            }
            self.failures += 1;
            let attempt = self.failures;
            self.state.send_replace(ConnectionState::Reconnecting { attempt });
            tokio::time::sleep(self.reconnect.backoff(attempt)).await;

            match open(&self.url).await {
                Ok(socket) => {
                    // Frames queued while the socket was down are not replayed
                    let mut discarded = 0;
                    while self.outbound.try_recv().is_ok() {
                        discarded += 1;
                    }
                    if discarded > 0 {
                        warn!(discarded, "dropped frames queued during reconnect");
                    }
                    self.state.send_replace(ConnectionState::Open);
                    info!(url = %self.url, attempt, "chat socket reconnected");
                    return Some(socket);
                }
                Err(e) => warn!(attempt, "chat reconnect failed: {}", e),
            }
        }

        if self.reconnect.max_attempts > 0 {
            warn!(url = %self.url, "giving up on chat socket");
        }
        None
    }
}
