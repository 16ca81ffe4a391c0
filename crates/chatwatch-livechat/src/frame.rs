// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine.IO / Socket.IO text frame codec.
//!
//! Every frame is a numeric packet-type prefix followed by an optional JSON
//! body. Only the subset spoken by the pump.fun live chat is modelled.

use std::time::Duration;

use chatwatch_core::ChatwatchError;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::ack::AckKind;

/// Heartbeat request, sent by either side.
pub const PING: &str = "2";
/// Heartbeat reply.
pub const PONG: &str = "3";

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `0{...}` engine handshake, carrying the server's ping interval.
    Open { ping_interval: Option<Duration> },
    /// `40...` namespace connected.
    NamespaceConnected,
    /// `42["name", payload]` server event.
    Event { name: String, payload: Value },
    /// `43<digit>[...]` reply to a numbered request.
    Ack { id: u8, payload: Value },
    /// `43[...]` reply without an id.
    GenericAck(Value),
    Ping,
    Pong,
    /// Anything else; holds the unrecognized prefix.
    Other(String),
}

/// Errors produced while decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,

    #[error("invalid JSON in `{prefix}` frame: {source}")]
    InvalidJson {
        prefix: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed event frame: {0}")]
    MalformedEvent(String),
}

impl From<FrameError> for ChatwatchError {
    fn from(err: FrameError) -> Self {
        ChatwatchError::protocol(err.to_string())
    }
}

#[derive(Deserialize)]
struct OpenBody {
    #[serde(rename = "pingInterval")]
    ping_interval: Option<u64>,
}

impl Frame {
    /// Decode one text frame.
    pub fn parse(raw: &str) -> Result<Frame, FrameError> {
        if raw.is_empty() {
            return Err(FrameError::Empty);
        }

        if let Some(body) = raw.strip_prefix('0') {
            let open: OpenBody = serde_json::from_str(body).map_err(|source| {
                FrameError::InvalidJson {
                    prefix: "0",
                    source,
                }
            })?;
            return Ok(Frame::Open {
                ping_interval: open.ping_interval.map(Duration::from_millis),
            });
        }

        if raw.starts_with("40") {
            return Ok(Frame::NamespaceConnected);
        }

        if let Some(body) = raw.strip_prefix("42") {
            return parse_event(body.trim_start_matches(|c: char| c.is_ascii_digit()));
        }

        if let Some(body) = raw.strip_prefix("43") {
            let mut chars = body.chars();
            if let Some(digit) = chars.next().and_then(|c| c.to_digit(10)) {
                let payload = parse_json("43", chars.as_str())?;
                return Ok(Frame::Ack {
                    id: digit as u8,
                    payload,
                });
            }
            return Ok(Frame::GenericAck(parse_json("43", body)?));
        }

        if raw.starts_with(PING) {
            return Ok(Frame::Ping);
        }

        if raw.starts_with(PONG) {
            return Ok(Frame::Pong);
        }

        let prefix: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
        Ok(Frame::Other(if prefix.is_empty() {
            raw.chars().take(2).collect()
        } else {
            prefix
        }))
    }
}

fn parse_json(prefix: &'static str, body: &str) -> Result<Value, FrameError> {
    serde_json::from_str(body).map_err(|source| FrameError::InvalidJson { prefix, source })
}

fn parse_event(body: &str) -> Result<Frame, FrameError> {
    let value = parse_json("42", body)?;
    let Value::Array(mut items) = value else {
        return Err(FrameError::MalformedEvent("expected a JSON array".into()));
    };
    if items.is_empty() {
        return Err(FrameError::MalformedEvent("empty event array".into()));
    }
    let payload = if items.len() > 1 {
        items.swap_remove(1)
    } else {
        Value::Null
    };
    match items.swap_remove(0) {
        Value::String(name) => Ok(Frame::Event { name, payload }),
        other => Err(FrameError::MalformedEvent(format!(
            "event name must be a string, got {other}"
        ))),
    }
}

/// `40{"origin":...,"timestamp":...,"token":null}` namespace connect frame.
pub fn encode_namespace_connect(origin: &str, timestamp_ms: i64) -> String {
    let body = json!({
        "origin": origin,
        "timestamp": timestamp_ms,
        "token": null,
    });
    format!("40{body}")
}

/// `42<id>["event",payload]` request frame expecting a numbered ack.
pub fn encode_request(ack_id: u8, event: &str, payload: &Value) -> String {
    let body = Value::Array(vec![Value::String(event.to_string()), payload.clone()]);
    format!("42{ack_id}{body}")
}

/// Outbound requests understood by the chat server.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    JoinRoom {
        room_id: String,
        username: String,
    },
    GetMessageHistory {
        room_id: String,
        limit: usize,
    },
    SendMessage {
        room_id: String,
        message: String,
        username: String,
    },
}

impl Request {
    pub fn kind(&self) -> AckKind {
        match self {
            Request::JoinRoom { .. } => AckKind::JoinRoom,
            Request::GetMessageHistory { .. } => AckKind::GetMessageHistory,
            Request::SendMessage { .. } => AckKind::SendMessage,
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Request::JoinRoom { room_id, username } => json!({
                "roomId": room_id,
                "username": username,
            }),
            Request::GetMessageHistory { room_id, limit } => json!({
                "roomId": room_id,
                "before": null,
                "limit": limit,
            }),
            Request::SendMessage {
                room_id,
                message,
                username,
            } => json!({
                "roomId": room_id,
                "message": message,
                "username": username,
            }),
        }
    }

    /// Encode with the given ack id.
    pub fn encode(&self, ack_id: u8) -> String {
        encode_request(ack_id, &self.kind().to_string(), &self.payload())
    }
}
