// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded chat message buffer with cursor-based selection.
//!
//! The buffer is written by a single task (see [`spawn_buffer_writer`]) and
//! read by everyone else through [`SharedBuffer`].

use std::collections::VecDeque;
use std::sync::Arc;

use chatwatch_core::{ChatMessage, UNKNOWN_USERNAME};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use tracing::debug;

/// Shared, read-mostly handle to the buffer.
pub type SharedBuffer = Arc<RwLock<MessageBuffer>>;

/// A chat message as received from the server, before ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawMessage {
    pub username: Option<String>,
    pub text: String,
}

impl RawMessage {
    pub fn new(username: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            username: username.map(str::to_owned),
            text: text.into(),
        }
    }

    /// Read a server message object. `username` wins over `user`; returns
    /// `None` for non-objects.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let username = ["username", "user"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .map(str::to_owned);
        let text = object
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        Some(Self { username, text })
    }
}

/// Mutations applied by the buffer writer task.
#[derive(Debug, Clone, PartialEq)]
pub enum BufferUpdate {
    Ingest(RawMessage),
    MergeHistory(Vec<RawMessage>),
}

/// Result of [`MessageBuffer::select_new`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    /// At most `limit` messages newer than the cursor, ascending by id.
    pub messages: Vec<ChatMessage>,
    /// Highest id seen over the whole scan; equals the cursor when nothing is newer.
    pub max_id: u64,
}

#[derive(Debug)]
pub struct MessageBuffer {
    messages: VecDeque<ChatMessage>,
    history_limit: usize,
    max_message_length: usize,
    last_sequence_id: u64,
}

impl MessageBuffer {
    pub fn new(history_limit: usize, max_message_length: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(history_limit.min(1024)),
            history_limit,
            max_message_length,
            last_sequence_id: 0,
        }
    }

    pub fn shared(history_limit: usize, max_message_length: usize) -> SharedBuffer {
        Arc::new(RwLock::new(Self::new(history_limit, max_message_length)))
    }

    fn stamp(&mut self, raw: RawMessage) -> ChatMessage {
        self.last_sequence_id += 1;
        let text = match raw.text.char_indices().nth(self.max_message_length) {
            Some((cut, _)) => raw.text[..cut].to_owned(),
            None => raw.text,
        };
        ChatMessage {
            sequence_id: self.last_sequence_id,
            username: raw
                .username
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| UNKNOWN_USERNAME.to_owned()),
            text,
            received_at: Utc::now(),
        }
    }

    /// Append a live message, evicting the oldest when full.
    pub fn ingest(&mut self, raw: RawMessage) -> &ChatMessage {
        let message = self.stamp(raw);
        if self.messages.len() >= self.history_limit {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
        &self.messages[self.messages.len() - 1]
    }

    /// Prepend a history batch, then keep the most recent `history_limit`.
    ///
    /// Each entry gets a fresh id in batch order; server ids are ignored.
    pub fn merge_history(&mut self, batch: Vec<RawMessage>) {
        let older: Vec<ChatMessage> = batch.into_iter().map(|raw| self.stamp(raw)).collect();
        let merged_count = older.len();
        let current = std::mem::take(&mut self.messages);
        let mut combined: VecDeque<ChatMessage> = older.into_iter().chain(current).collect();
        let excess = combined.len().saturating_sub(self.history_limit);
        combined.drain(..excess);
        self.messages = combined;
        debug!(
            merged = merged_count,
            total = self.messages.len(),
            "message history merged"
        );
    }

    /// Up to `limit` messages with id above `cursor`.
    ///
    /// Collection stops at `limit` but the id scan covers the whole buffer,
    /// so `max_id` can exceed the last returned id. Callers that advance the
    /// cursor to `max_id` skip the uncollected remainder.
    pub fn select_new(&self, cursor: u64, limit: usize) -> Selection {
        let mut selection = Selection {
            messages: Vec::with_capacity(limit.min(self.messages.len())),
            max_id: cursor,
        };
        for message in &self.messages {
            if message.sequence_id > cursor && selection.messages.len() < limit {
                selection.messages.push(message.clone());
            }
            selection.max_id = selection.max_id.max(message.sequence_id);
        }
        // Merged history sits before newer live messages in storage order.
        selection.messages.sort_by_key(|m| m.sequence_id);
        selection
    }

    /// The most recent `count` messages, oldest first.
    pub fn tail(&self, count: usize) -> Vec<ChatMessage> {
        let skip = self.messages.len().saturating_sub(count);
        self.messages.iter().skip(skip).cloned().collect()
    }

    pub fn latest(&self) -> Option<&ChatMessage> {
        self.messages.back()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Last id handed out, including evicted messages. 0 before any ingestion.
    pub fn last_sequence_id(&self) -> u64 {
        self.last_sequence_id
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    pub fn apply(&mut self, update: BufferUpdate) {
        match update {
            BufferUpdate::Ingest(raw) => {
                let message = self.ingest(raw);
                debug!(
                    sequence_id = message.sequence_id,
                    username = %message.username,
                    "chat message buffered"
                );
            }
            BufferUpdate::MergeHistory(batch) => self.merge_history(batch),
        }
    }
}

/// Spawn the task that owns all buffer writes. Exits when every sender is dropped.
pub fn spawn_buffer_writer(
    buffer: SharedBuffer,
    mut updates: mpsc::Receiver<BufferUpdate>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            buffer.write().await.apply(update);
        }
        debug!("buffer writer stopped");
    })
}
