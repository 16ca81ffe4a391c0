// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live chat session: protocol state, the WebSocket driver and its control handle.
//!
//! [`ChatProtocol`] turns inbound frames into [`Action`]s without touching a
//! socket. [`ChatSession`] owns the socket, the ping timer and the reconnect
//! state machine, and is steered through a [`ChatHandle`].

use std::pin::Pin;
use std::time::{Duration, Instant};

use chatwatch_config::model::ChatConfig;
use chatwatch_core::{ChatwatchError, ConnectionState};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Sleep;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, header::ORIGIN};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::ack::{AckKind, AckTable};
use crate::buffer::{BufferUpdate, RawMessage, SharedBuffer, spawn_buffer_writer};
use crate::frame::{Frame, PING, PONG, Request, encode_namespace_connect};
use crate::history::HistoryShape;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const CONTROL_CHANNEL_CAPACITY: usize = 16;
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Exponential reconnect delays: `min(2^attempt, max_delay)` seconds for
/// attempts `1..=max_attempts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_attempts: u32,
    pub max_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect `attempt` (1-based), or `None` once exhausted.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let secs = 2u64.checked_pow(attempt).unwrap_or(u64::MAX);
        Some(Duration::from_secs(secs).min(self.max_delay))
    }
}

/// Connection parameters for one chat room.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub origin: String,
    pub room_id: String,
    pub username: String,
    pub history_limit: usize,
    pub reconnect: ReconnectPolicy,
    pub connect_timeout: Duration,
}

impl SessionConfig {
    pub fn from_config(chat: &ChatConfig) -> Result<Self, ChatwatchError> {
        let room_id = chat
            .room_id
            .clone()
            .filter(|r| !r.trim().is_empty())
            .ok_or_else(|| ChatwatchError::Config("chat.room_id is not set".into()))?;
        Ok(Self {
            url: chat.websocket_url.clone(),
            origin: chat.origin.clone(),
            room_id,
            username: chat.username.clone(),
            history_limit: chat.history_limit,
            reconnect: ReconnectPolicy {
                max_attempts: chat.max_reconnect_attempts,
                max_delay: Duration::from_secs(chat.max_backoff_secs),
            },
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }
}

/// Side effect requested by [`ChatProtocol`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send(String),
    /// Arm the single-shot heartbeat timer.
    SchedulePing(Duration),
    Buffer(BufferUpdate),
}

/// Transport-free protocol state for one room.
#[derive(Debug)]
pub struct ChatProtocol {
    room_id: String,
    username: String,
    origin: String,
    history_limit: usize,
    acks: AckTable,
}

impl ChatProtocol {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            room_id: config.room_id.clone(),
            username: config.username.clone(),
            origin: config.origin.clone(),
            history_limit: config.history_limit,
            acks: AckTable::new(),
        }
    }

    pub fn acks(&self) -> &AckTable {
        &self.acks
    }

    /// Handle one inbound text frame.
    pub fn on_frame(&mut self, raw: &str) -> Vec<Action> {
        let frame = match Frame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                return Vec::new();
            }
        };

        match frame {
            Frame::Open { ping_interval } => {
                let mut actions = Vec::with_capacity(2);
                if let Some(interval) = ping_interval {
                    actions.push(Action::SchedulePing(interval));
                }
                actions.push(Action::Send(encode_namespace_connect(
                    &self.origin,
                    Utc::now().timestamp_millis(),
                )));
                actions
            }
            Frame::NamespaceConnected => {
                debug!(room_id = %self.room_id, "namespace connected, joining room");
                vec![self.request(Request::JoinRoom {
                    room_id: self.room_id.clone(),
                    username: self.username.clone(),
                })]
            }
            Frame::Event { name, payload } => self.on_event(&name, &payload),
            Frame::Ack { id, payload } => self.on_ack(id, &payload),
            Frame::GenericAck(payload) => self.history_update(&payload).into_iter().collect(),
            Frame::Ping => vec![Action::Send(PONG.to_owned())],
            Frame::Pong => Vec::new(),
            Frame::Other(prefix) => {
                debug!(%prefix, "ignoring frame");
                Vec::new()
            }
        }
    }

    /// Build a `sendMessage` request.
    pub fn send_message(&mut self, text: &str) -> Action {
        self.request(Request::SendMessage {
            room_id: self.room_id.clone(),
            message: text.to_owned(),
            username: self.username.clone(),
        })
    }

    fn on_event(&mut self, name: &str, payload: &Value) -> Vec<Action> {
        match name {
            "newMessage" => match RawMessage::from_value(payload) {
                Some(raw) => vec![Action::Buffer(BufferUpdate::Ingest(raw))],
                None => {
                    warn!("newMessage payload is not an object");
                    Vec::new()
                }
            },
            "setCookie" => vec![self.history_request()],
            "userLeft" => {
                debug!(%payload, "user left");
                Vec::new()
            }
            other => {
                debug!(event = other, "unhandled event");
                Vec::new()
            }
        }
    }

    fn on_ack(&mut self, id: u8, payload: &Value) -> Vec<Action> {
        let Some(pending) = self.acks.resolve(id) else {
            warn!(ack_id = id, "ack without a pending request; dropped");
            return Vec::new();
        };
        debug!(
            ack_id = id,
            kind = %pending.kind,
            elapsed_ms = pending.created_at.elapsed().as_millis() as u64,
            "ack received"
        );

        match pending.kind {
            AckKind::JoinRoom => {
                info!(room_id = %self.room_id, "joined room, requesting history");
                vec![self.history_request()]
            }
            AckKind::GetMessageHistory => match payload.get(0) {
                Some(Value::Array(list)) => vec![Action::Buffer(BufferUpdate::MergeHistory(
                    HistoryShape::Nested(list.clone()).into_messages(),
                ))],
                _ => {
                    warn!(%payload, "history ack without a message list; dropped");
                    Vec::new()
                }
            },
            AckKind::SendMessage => {
                if let Some(err) = payload.get(0).and_then(|first| first.get("error")) {
                    warn!(error = %err, "server rejected sent message");
                }
                Vec::new()
            }
        }
    }

    fn history_request(&mut self) -> Action {
        self.request(Request::GetMessageHistory {
            room_id: self.room_id.clone(),
            limit: self.history_limit,
        })
    }

    fn history_update(&self, payload: &Value) -> Option<Action> {
        match HistoryShape::decode(payload) {
            Ok(shape) => Some(Action::Buffer(BufferUpdate::MergeHistory(
                shape.into_messages(),
            ))),
            Err(e) => {
                warn!(error = %e, "dropping history reply");
                None
            }
        }
    }

    fn request(&mut self, request: Request) -> Action {
        let id = self.acks.register(request.kind(), Instant::now());
        Action::Send(request.encode(id))
    }
}

/// Operator commands delivered to a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Pause,
    Resume,
    Send(String),
}

/// Cloneable control surface of a [`ChatSession`].
#[derive(Debug, Clone)]
pub struct ChatHandle {
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<ConnectionState>,
}

impl ChatHandle {
    /// Close the socket and stay disconnected until [`ChatHandle::resume`].
    pub async fn pause(&self) -> Result<(), ChatwatchError> {
        self.command(SessionCommand::Pause).await
    }

    /// Reconnect when paused or failed. No effect while connected or backing off.
    pub async fn resume(&self) -> Result<(), ChatwatchError> {
        self.command(SessionCommand::Resume).await
    }

    /// Post a message to the room. Dropped with a warning when not connected.
    pub async fn send_message(&self, text: impl Into<String>) -> Result<(), ChatwatchError> {
        self.command(SessionCommand::Send(text.into())).await
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    async fn command(&self, command: SessionCommand) -> Result<(), ChatwatchError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ChatwatchError::Internal("chat session is not running".into()))
    }
}

/// Session-side ends of the control and state channels.
#[derive(Debug)]
pub struct SessionControls {
    commands: mpsc::Receiver<SessionCommand>,
    state: watch::Sender<ConnectionState>,
}

impl SessionControls {
    pub fn publish(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "connection state changed");
        }
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub async fn recv(&mut self) -> Option<SessionCommand> {
        self.commands.recv().await
    }

    #[cfg(any(test, feature = "test-utils"))]
    pub fn try_recv(&mut self) -> Option<SessionCommand> {
        self.commands.try_recv().ok()
    }
}

/// Create a linked handle and session controls.
pub fn control_channel() -> (ChatHandle, SessionControls) {
    let (command_tx, command_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
    (
        ChatHandle {
            commands: command_tx,
            state: state_rx,
        },
        SessionControls {
            commands: command_rx,
            state: state_tx,
        },
    )
}

enum Exit {
    Cancelled,
    Paused,
    Dropped(String),
}

enum Dial {
    Open(WsStream),
    Failed(ChatwatchError),
    Paused,
    Cancelled,
}

enum Wake {
    Elapsed,
    Resumed,
    Paused,
    Cancelled,
}

/// Owns one WebSocket connection at a time and the reconnect state machine.
pub struct ChatSession {
    config: SessionConfig,
    protocol: ChatProtocol,
    updates: mpsc::Sender<BufferUpdate>,
    controls: SessionControls,
    controls_open: bool,
}

impl ChatSession {
    pub fn new(
        config: SessionConfig,
        updates: mpsc::Sender<BufferUpdate>,
        controls: SessionControls,
    ) -> Self {
        Self {
            protocol: ChatProtocol::new(&config),
            config,
            updates,
            controls,
            controls_open: true,
        }
    }

    /// Run until cancelled. Timers live inside this future and die with it.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut failures: u32 = 0;
        let mut paused = false;

        loop {
            if paused {
                self.controls.publish(ConnectionState::Paused);
                match self.idle(None, &cancel).await {
                    Wake::Cancelled => break,
                    Wake::Resumed => {
                        info!("resuming live chat");
                        paused = false;
                        failures = 0;
                    }
                    Wake::Paused | Wake::Elapsed => {}
                }
                continue;
            }

            self.controls.publish(ConnectionState::Connecting);
            match self.dial(&cancel).await {
                Dial::Cancelled => break,
                Dial::Paused => {
                    paused = true;
                    continue;
                }
                Dial::Open(ws) => {
                    failures = 0;
                    info!(room_id = %self.config.room_id, "connected to live chat");
                    self.controls.publish(ConnectionState::Connected);
                    match self.drive(ws, &cancel).await {
                        Exit::Cancelled => break,
                        Exit::Paused => {
                            paused = true;
                            continue;
                        }
                        Exit::Dropped(reason) => warn!(%reason, "live chat connection lost"),
                    }
                }
                Dial::Failed(e) => warn!(error = %e, "live chat connection failed"),
            }

            failures += 1;
            match self.config.reconnect.delay_for(failures) {
                Some(delay) => {
                    info!(
                        attempt = failures,
                        delay_secs = delay.as_secs(),
                        "scheduling reconnect"
                    );
                    self.controls.publish(ConnectionState::Backoff {
                        attempt: failures,
                        delay_secs: delay.as_secs(),
                    });
                    match self.idle(Some(delay), &cancel).await {
                        Wake::Cancelled => break,
                        Wake::Paused => paused = true,
                        Wake::Elapsed | Wake::Resumed => {}
                    }
                }
                None => {
                    error!(
                        attempts = self.config.reconnect.max_attempts,
                        "reconnect attempts exhausted"
                    );
                    self.controls.publish(ConnectionState::Failed);
                    match self.idle(None, &cancel).await {
                        Wake::Cancelled => break,
                        Wake::Paused => paused = true,
                        Wake::Resumed => {
                            info!("restarting live chat after failure");
                            failures = 0;
                        }
                        Wake::Elapsed => {}
                    }
                }
            }
        }

        self.controls.publish(ConnectionState::Disconnected);
        debug!("chat session stopped");
    }

    /// Open a connection while still answering control commands.
    async fn dial(&mut self, cancel: &CancellationToken) -> Dial {
        let attempt = connect(&self.config);
        tokio::pin!(attempt);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Dial::Cancelled,
                result = &mut attempt => {
                    return match result {
                        Ok(ws) => Dial::Open(ws),
                        Err(e) => Dial::Failed(e),
                    };
                }
                command = self.controls.commands.recv(), if self.controls_open => match command {
                    Some(SessionCommand::Pause) => {
                        info!("pausing live chat, connect abandoned");
                        return Dial::Paused;
                    }
                    Some(SessionCommand::Resume) => debug!("resume ignored, already connecting"),
                    Some(SessionCommand::Send(_)) => warn!("not connected; outgoing message dropped"),
                    None => self.controls_open = false,
                },
            }
        }
    }

    /// Receive loop for one open connection.
    async fn drive(&mut self, ws: WsStream, cancel: &CancellationToken) -> Exit {
        let (mut sink, mut stream) = ws.split();
        let mut ping: Option<Pin<Box<Sleep>>> = None;

        loop {
            let actions = tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = sink.close().await;
                    return Exit::Cancelled;
                }
                command = self.controls.commands.recv(), if self.controls_open => match command {
                    Some(SessionCommand::Pause) => {
                        info!("pausing live chat");
                        let _ = sink.close().await;
                        return Exit::Paused;
                    }
                    Some(SessionCommand::Resume) => {
                        debug!("resume ignored, already connected");
                        Vec::new()
                    }
                    Some(SessionCommand::Send(text)) => vec![self.protocol.send_message(&text)],
                    None => {
                        self.controls_open = false;
                        Vec::new()
                    }
                },
                _ = ping_due(&mut ping) => {
                    ping = None;
                    vec![Action::Send(PING.to_owned())]
                }
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.protocol.on_frame(text.as_str()),
                    Some(Ok(Message::Close(close))) => {
                        return Exit::Dropped(format!("closed by server: {close:?}"));
                    }
                    Some(Ok(_)) => Vec::new(),
                    Some(Err(e)) => return Exit::Dropped(e.to_string()),
                    None => return Exit::Dropped("stream ended".into()),
                },
            };

            for action in actions {
                match action {
                    Action::Send(frame) => {
                        if let Err(e) = sink.send(Message::text(frame)).await {
                            return Exit::Dropped(e.to_string());
                        }
                    }
                    Action::SchedulePing(interval) => {
                        ping = Some(Box::pin(tokio::time::sleep(interval)));
                    }
                    Action::Buffer(update) => {
                        if self.updates.send(update).await.is_err() {
                            warn!("buffer writer stopped; update dropped");
                        }
                    }
                }
            }
        }
    }

    /// Wait while disconnected. `delay` of `None` waits for a command.
    async fn idle(&mut self, delay: Option<Duration>, cancel: &CancellationToken) -> Wake {
        let timer = async {
            match delay {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(timer);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Wake::Cancelled,
                _ = &mut timer => return Wake::Elapsed,
                command = self.controls.commands.recv(), if self.controls_open => match command {
                    Some(SessionCommand::Pause) => return Wake::Paused,
                    Some(SessionCommand::Resume) if delay.is_none() => return Wake::Resumed,
                    Some(SessionCommand::Resume) => debug!("reconnect already scheduled"),
                    Some(SessionCommand::Send(_)) => warn!("not connected; outgoing message dropped"),
                    None => self.controls_open = false,
                },
            }
        }
    }
}

async fn connect(config: &SessionConfig) -> Result<WsStream, ChatwatchError> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| ChatwatchError::Transport {
            message: format!("invalid chat url `{}`", config.url),
            source: Some(Box::new(e)),
        })?;
    let origin = HeaderValue::from_str(&config.origin)
        .map_err(|e| ChatwatchError::Config(format!("invalid origin header: {e}")))?;
    request.headers_mut().insert(ORIGIN, origin);

    let (ws, response) = tokio::time::timeout(config.connect_timeout, connect_async(request))
        .await
        .map_err(|_| ChatwatchError::Timeout {
            duration: config.connect_timeout,
        })?
        .map_err(|e| ChatwatchError::Transport {
            message: "websocket handshake failed".into(),
            source: Some(Box::new(e)),
        })?;
    debug!(status = %response.status(), "websocket handshake complete");
    Ok(ws)
}

async fn ping_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}

/// A running live chat: its control handle and background tasks.
pub struct LiveChat {
    pub handle: ChatHandle,
    pub session: JoinHandle<()>,
    pub writer: JoinHandle<()>,
}

/// Spawn the session and the buffer writer that it feeds.
pub fn spawn(config: SessionConfig, buffer: SharedBuffer, cancel: CancellationToken) -> LiveChat {
    let (handle, controls) = control_channel();
    let (session, writer) = spawn_attached(config, buffer, controls, cancel);
    LiveChat {
        handle,
        session,
        writer,
    }
}

/// Like [`spawn`], for controls whose [`ChatHandle`] was handed out earlier.
///
/// Returns the session and buffer writer tasks.
pub fn spawn_attached(
    config: SessionConfig,
    buffer: SharedBuffer,
    controls: SessionControls,
    cancel: CancellationToken,
) -> (JoinHandle<()>, JoinHandle<()>) {
    let (updates_tx, updates_rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
    let writer = spawn_buffer_writer(buffer, updates_rx);
    let session = tokio::spawn(ChatSession::new(config, updates_tx, controls).run(cancel));
    (session, writer)
}
