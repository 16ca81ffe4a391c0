// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the chat session, analysis cycle and HTTP surface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Username recorded when a chat payload carries none.
pub const UNKNOWN_USERNAME: &str = "unknown";

/// A chat message as held in the message buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Ingestion order key. Strictly increasing over the life of a buffer.
    pub sequence_id: u64,
    /// Author display name, or [`UNKNOWN_USERNAME`].
    pub username: String,
    /// Message text, already truncated to the configured maximum length.
    pub text: String,
    /// Local clock at ingestion (not a server timestamp).
    pub received_at: DateTime<Utc>,
}

/// One completed commentary produced by the analysis cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// Cycling identifier in `0..=10000`.
    pub id: u32,
    pub timestamp: DateTime<Utc>,
    /// Number of chat lines sent to the completion endpoint.
    pub message_count: usize,
    /// Text returned by the completion endpoint.
    pub analysis: String,
    /// Chat room (token address) the analyzed messages came from.
    pub token_address: String,
}

/// Operator-selectable analysis mode.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    /// Regular commentary.
    #[default]
    Normal,
    /// Alternate mode: the analysis cycle is suspended.
    Music,
}

impl AnalysisMode {
    /// Parses a mode name, falling back to [`AnalysisMode::Normal`] for
    /// anything unrecognized.
    pub fn parse_lenient(value: &str) -> Self {
        value.trim().parse().unwrap_or_default()
    }

    /// Returns true when the analysis cycle must not run in this mode.
    pub fn suspends_analysis(self) -> bool {
        matches!(self, AnalysisMode::Music)
    }
}

/// Connection state published by the chat session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting before reconnect attempt `attempt`.
    Backoff { attempt: u32, delay_secs: u64 },
    /// Stopped by the operator; no reconnect is attempted.
    Paused,
    /// Reconnect attempts exhausted.
    Failed,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Backoff { attempt, delay_secs } => {
                write!(f, "reconnecting (attempt {attempt} in {delay_secs}s)")
            }
            ConnectionState::Paused => write!(f, "paused"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// Status snapshot reported by a completion provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub api_key_configured: bool,
    pub model: String,
    /// Start of the most recent request, if any was made.
    pub last_request_time: Option<DateTime<Utc>>,
    pub rate_limit_delay_secs: f64,
}
