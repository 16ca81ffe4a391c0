// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic analysis cycle.
//!
//! Each tick selects chat messages newer than the cursor, formats them as
//! `"<username> + <text>"` lines, and asks the completion provider for
//! commentary. The cursor moves past every selected batch whether or not the
//! completion succeeds, so a failed batch is never sent again.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chatwatch_config::model::AnalysisConfig;
use chatwatch_core::{AnalysisMode, AnalysisRecord, ChatMessage, CompletionProvider};
use chatwatch_livechat::SharedBuffer;
use chrono::Utc;
use tokio::sync::{Mutex, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::stats::Statistics;

/// Largest record id before wrapping back to 0.
pub const MAX_RECORD_ID: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ModeSuspended,
    Throttled,
    NoNewMessages,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Skipped(SkipReason),
    Analyzed(AnalysisRecord),
    Failed,
}

#[derive(Debug, Default)]
struct CycleState {
    cursor: u64,
    last_call: Option<Instant>,
    next_id: u32,
    records: VecDeque<AnalysisRecord>,
    last_error: Option<String>,
}

impl CycleState {
    fn push_record(&mut self, mut record: AnalysisRecord, max_results: usize) -> AnalysisRecord {
        record.id = self.next_id;
        self.next_id = if self.next_id >= MAX_RECORD_ID {
            0
        } else {
            self.next_id + 1
        };
        self.records.push_back(record.clone());
        while self.records.len() > max_results {
            self.records.pop_front();
        }
        record
    }
}

/// Turns buffered chat into commentary on a fixed interval.
pub struct AnalysisCycle {
    provider: Arc<dyn CompletionProvider>,
    buffer: SharedBuffer,
    token_address: String,
    interval: Duration,
    batch_limit: usize,
    max_results: usize,
    mode: watch::Sender<AnalysisMode>,
    paused: AtomicBool,
    state: Mutex<CycleState>,
    stats: Arc<Mutex<Statistics>>,
}

impl AnalysisCycle {
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        buffer: SharedBuffer,
        token_address: impl Into<String>,
        config: &AnalysisConfig,
        stats: Arc<Mutex<Statistics>>,
    ) -> Self {
        // The interval doubles as a batch cap.
        let batch_limit = (config.max_batch as u64).min(config.interval_secs).max(1) as usize;
        Self {
            provider,
            buffer,
            token_address: token_address.into(),
            interval: Duration::from_secs(config.interval_secs),
            batch_limit,
            max_results: config.max_results.max(1),
            mode: watch::channel(AnalysisMode::default()).0,
            paused: AtomicBool::new(false),
            state: Mutex::new(CycleState::default()),
            stats,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    pub fn mode(&self) -> AnalysisMode {
        *self.mode.borrow()
    }

    pub fn set_mode(&self, mode: AnalysisMode) {
        let previous = self.mode.send_replace(mode);
        if previous != mode {
            info!(from = %previous, to = %mode, "analysis mode changed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }

    pub async fn cursor(&self) -> u64 {
        self.state.lock().await.cursor
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    /// The most recent `limit` records, oldest first.
    pub async fn analyses(&self, limit: usize) -> Vec<AnalysisRecord> {
        let state = self.state.lock().await;
        let skip = state.records.len().saturating_sub(limit);
        state.records.iter().skip(skip).cloned().collect()
    }

    pub async fn latest(&self) -> Option<AnalysisRecord> {
        self.state.lock().await.records.back().cloned()
    }

    pub async fn record_count(&self) -> usize {
        self.state.lock().await.records.len()
    }

    /// Run one tick of the cycle.
    pub async fn process_cycle(&self, now: Instant) -> CycleOutcome {
        let mode = self.mode();
        if mode.suspends_analysis() {
            debug!(%mode, "analysis suspended by mode");
            return CycleOutcome::Skipped(SkipReason::ModeSuspended);
        }

        let cursor = {
            let state = self.state.lock().await;
            if let Some(last) = state.last_call
                && now.saturating_duration_since(last) < self.interval
            {
                debug!("analysis throttled");
                return CycleOutcome::Skipped(SkipReason::Throttled);
            }
            state.cursor
        };

        let selection = self.buffer.read().await.select_new(cursor, self.batch_limit);
        if selection.messages.is_empty() {
            return CycleOutcome::Skipped(SkipReason::NoNewMessages);
        }

        let lines: Vec<String> = selection.messages.iter().map(format_line).collect();
        {
            let mut state = self.state.lock().await;
            state.cursor = state.cursor.max(selection.max_id);
            state.last_call = Some(now);
        }
        self.stats.lock().await.record_messages(lines.len());
        debug!(count = lines.len(), cursor = selection.max_id, "analyzing chat batch");

        match self.provider.analyze(&lines, mode).await {
            Ok(Some(text)) => {
                let at = Utc::now();
                let record = AnalysisRecord {
                    id: 0,
                    timestamp: at,
                    message_count: lines.len(),
                    analysis: text,
                    token_address: self.token_address.clone(),
                };
                let record = self.state.lock().await.push_record(record, self.max_results);
                self.stats.lock().await.record_analysis(at);
                info!(id = record.id, messages = record.message_count, "analysis recorded");
                CycleOutcome::Analyzed(record)
            }
            Ok(None) => {
                self.fail("completion returned no content".to_string()).await;
                CycleOutcome::Failed
            }
            Err(e) => {
                self.fail(e.to_string()).await;
                CycleOutcome::Failed
            }
        }
    }

    async fn fail(&self, error: String) {
        warn!(error = %error, provider = self.provider.name(), "analysis failed");
        self.stats.lock().await.record_api_error();
        self.state.lock().await.last_error = Some(error);
    }

    /// Tick until cancelled, sleeping `interval` after each cycle.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            batch = self.batch_limit,
            "analysis cycle started"
        );
        while !cancel.is_cancelled() {
            if !self.is_paused() {
                let outcome = self.process_cycle(Instant::now()).await;
                if let CycleOutcome::Skipped(reason) = outcome {
                    debug!(?reason, "analysis tick skipped");
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        info!("analysis cycle stopped");
    }
}

fn format_line(message: &ChatMessage) -> String {
    format!("{} + {}", message.username, message.text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatwatch_livechat::{MessageBuffer, RawMessage};
    use chatwatch_test_utils::{MockProvider, MockReply};

    fn config(interval_secs: u64, max_results: usize) -> AnalysisConfig {
        AnalysisConfig {
            interval_secs,
            max_results,
            max_batch: 6,
        }
    }

    async fn filled_buffer(texts: &[&str]) -> SharedBuffer {
        let buffer = MessageBuffer::shared(100, 100);
        {
            let mut guard = buffer.write().await;
            for text in texts {
                guard.ingest(RawMessage::new(Some("bob"), *text));
            }
        }
        buffer
    }

    fn cycle(
        provider: Arc<MockProvider>,
        buffer: SharedBuffer,
        config: AnalysisConfig,
    ) -> AnalysisCycle {
        AnalysisCycle::new(
            provider,
            buffer,
            "TokenAddr",
            &config,
            Arc::new(Mutex::new(Statistics::default())),
        )
    }

    #[tokio::test]
    async fn analyzes_new_messages_and_advances_cursor() {
        let provider = Arc::new(MockProvider::with_responses(vec!["hot take".into()]));
        let buffer = filled_buffer(&["gm", "wen moon"]).await;
        let cycle = cycle(provider.clone(), buffer, config(5, 50));

        let CycleOutcome::Analyzed(record) = cycle.process_cycle(Instant::now()).await else {
            panic!("expected an analysis");
        };
        assert_eq!(record.id, 0);
        assert_eq!(record.message_count, 2);
        assert_eq!(record.analysis, "hot take");
        assert_eq!(record.token_address, "TokenAddr");
        assert_eq!(cycle.cursor().await, 2);
        assert_eq!(
            provider.batches().await,
            vec![vec!["bob + gm".to_string(), "bob + wen moon".to_string()]]
        );
    }

    #[tokio::test]
    async fn nothing_new_is_skipped() {
        let provider = Arc::new(MockProvider::new());
        let cycle = cycle(provider.clone(), MessageBuffer::shared(10, 100), config(5, 50));
        assert_eq!(
            cycle.process_cycle(Instant::now()).await,
            CycleOutcome::Skipped(SkipReason::NoNewMessages)
        );
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn music_mode_skips_without_moving_cursor() {
        let provider = Arc::new(MockProvider::new());
        let cycle = cycle(provider.clone(), filled_buffer(&["a"]).await, config(5, 50));
        cycle.set_mode(AnalysisMode::Music);

        assert_eq!(
            cycle.process_cycle(Instant::now()).await,
            CycleOutcome::Skipped(SkipReason::ModeSuspended)
        );
        assert_eq!(cycle.cursor().await, 0);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn throttle_guards_the_interval() {
        let provider = Arc::new(MockProvider::new());
        let buffer = filled_buffer(&["a"]).await;
        let cycle = cycle(provider.clone(), buffer.clone(), config(5, 50));

        let start = Instant::now();
        assert!(matches!(
            cycle.process_cycle(start).await,
            CycleOutcome::Analyzed(_)
        ));
        buffer.write().await.ingest(RawMessage::new(Some("amy"), "b"));

        assert_eq!(
            cycle.process_cycle(start + Duration::from_secs(2)).await,
            CycleOutcome::Skipped(SkipReason::Throttled)
        );
        assert!(matches!(
            cycle.process_cycle(start + Duration::from_secs(5)).await,
            CycleOutcome::Analyzed(_)
        ));
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn batch_is_capped_by_interval() {
        let provider = Arc::new(MockProvider::new());
        let buffer = filled_buffer(&["1", "2", "3", "4", "5"]).await;
        let cycle = cycle(provider.clone(), buffer, config(2, 50));
        assert_eq!(cycle.batch_limit(), 2);

        cycle.process_cycle(Instant::now()).await;
        assert_eq!(provider.batches().await[0].len(), 2);
        // The cursor follows max_id across the whole buffer.
        assert_eq!(cycle.cursor().await, 5);
    }

    #[tokio::test]
    async fn one_second_interval_takes_one_message_per_tick() {
        let provider = Arc::new(MockProvider::new());
        let buffer = filled_buffer(&["a", "b", "c"]).await;
        let cycle = cycle(provider.clone(), buffer, config(1, 50));
        assert_eq!(cycle.batch_limit(), 1);

        let outcome = cycle.process_cycle(Instant::now()).await;
        let CycleOutcome::Analyzed(record) = outcome else {
            panic!("expected an analysis, got {outcome:?}");
        };
        assert_eq!(record.message_count, 1);
        assert_eq!(provider.batches().await[0], vec!["bob + a".to_string()]);
        assert_eq!(cycle.cursor().await, 3);
        assert_eq!(cycle.stats.lock().await.messages_received, 1);
    }

    #[tokio::test]
    async fn failed_batches_are_not_redelivered() {
        let provider = Arc::new(MockProvider::with_replies(vec![
            MockReply::Error("upstream down".into()),
            MockReply::Empty,
        ]));
        let buffer = filled_buffer(&["a", "b"]).await;
        let cycle = cycle(provider.clone(), buffer.clone(), config(2, 50));

        let start = Instant::now();
        assert_eq!(cycle.process_cycle(start).await, CycleOutcome::Failed);
        assert_eq!(provider.batches().await[0].len(), 2);
        assert_eq!(cycle.cursor().await, 2);
        assert!(cycle.last_error().await.unwrap().contains("upstream down"));

        assert_eq!(
            cycle.process_cycle(start + Duration::from_secs(2)).await,
            CycleOutcome::Skipped(SkipReason::NoNewMessages)
        );

        buffer.write().await.ingest(RawMessage::new(None, "c"));
        assert_eq!(
            cycle.process_cycle(start + Duration::from_secs(4)).await,
            CycleOutcome::Failed
        );
        assert_eq!(provider.batches().await[1], vec!["unknown + c".to_string()]);

        let stats = cycle.stats.lock().await.clone();
        assert_eq!(stats.api_errors, 2);
        assert_eq!(stats.messages_received, 3);
        assert_eq!(stats.analyses_performed, 0);
    }

    #[tokio::test]
    async fn record_history_is_bounded() {
        let provider = Arc::new(MockProvider::new());
        let buffer = MessageBuffer::shared(100, 100);
        let cycle = cycle(provider, buffer.clone(), config(1, 2));

        let start = Instant::now();
        for i in 0..3u64 {
            buffer
                .write()
                .await
                .ingest(RawMessage::new(Some("bob"), format!("msg {i}")));
            cycle.process_cycle(start + Duration::from_secs(i)).await;
        }

        let records = cycle.analyses(10).await;
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(cycle.latest().await.map(|r| r.id), Some(2));
        assert_eq!(cycle.analyses(1).await.len(), 1);
    }

    #[test]
    fn record_ids_wrap() {
        let mut state = CycleState {
            next_id: MAX_RECORD_ID,
            ..CycleState::default()
        };
        let record = AnalysisRecord {
            id: 0,
            timestamp: Utc::now(),
            message_count: 1,
            analysis: "x".into(),
            token_address: "t".into(),
        };
        assert_eq!(state.push_record(record.clone(), 5).id, MAX_RECORD_ID);
        assert_eq!(state.push_record(record, 5).id, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn run_skips_while_paused_and_stops_on_cancel() {
        let provider = Arc::new(MockProvider::new());
        let cycle = Arc::new(cycle(
            provider.clone(),
            filled_buffer(&["a"]).await,
            config(1, 50),
        ));
        cycle.set_paused(true);

        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let cycle = cycle.clone();
            let cancel = cancel.clone();
            async move { cycle.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(provider.calls(), 0);

        cycle.set_paused(false);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(provider.calls(), 1);

        cancel.cancel();
        task.await.unwrap();
    }
}
