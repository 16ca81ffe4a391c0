// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock completion provider for deterministic testing.
//!
//! `MockProvider` implements `CompletionProvider` with pre-configured replies
//! and records every batch it is asked to analyze.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use chatwatch_core::{AnalysisMode, ChatwatchError, CompletionProvider, ProviderStatus};

/// One scripted outcome of [`MockProvider::analyze`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    Text(String),
    /// `Ok(None)`: the endpoint produced no content.
    Empty,
    /// `Err(Provider)` with this message.
    Error(String),
}

/// A mock completion provider that returns pre-configured replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty,
/// a default "mock analysis" text is returned.
pub struct MockProvider {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    batches: Arc<Mutex<Vec<Vec<String>>>>,
    calls: AtomicUsize,
    healthy: AtomicBool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::from(replies))),
            batches: Arc::new(Mutex::new(Vec::new())),
            calls: AtomicUsize::new(0),
            healthy: AtomicBool::new(true),
        }
    }

    /// Shorthand for a queue of successful texts.
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self::with_replies(responses.into_iter().map(MockReply::Text).collect())
    }

    pub async fn add_reply(&self, reply: MockReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Make [`CompletionProvider::test_connection`] report failure.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Number of `analyze` calls that reached the provider.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every batch of lines received, in call order.
    pub async fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().await.clone()
    }

    async fn next_reply(&self) -> MockReply {
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| MockReply::Text("mock analysis".to_string()))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    async fn analyze(
        &self,
        lines: &[String],
        _mode: AnalysisMode,
    ) -> Result<Option<String>, ChatwatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().await.push(lines.to_vec());
        match self.next_reply().await {
            MockReply::Text(text) => Ok(Some(text)),
            MockReply::Empty => Ok(None),
            MockReply::Error(message) => Err(ChatwatchError::provider(message)),
        }
    }

    async fn test_connection(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    fn status(&self) -> ProviderStatus {
        ProviderStatus {
            api_key_configured: true,
            model: "mock-model".to_string(),
            last_request_time: (self.calls() > 0).then(Utc::now),
            rate_limit_delay_secs: 0.0,
        }
    }
}
