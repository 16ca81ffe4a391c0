// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot coordination for chatwatch.
//!
//! [`ChatBot`] ties the chat session handle, the shared message buffer, the
//! [`AnalysisCycle`] and the completion provider together, and answers the
//! status and control requests coming from the HTTP surface.

pub mod analysis;
pub mod shutdown;
pub mod stats;

use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chatwatch_config::model::AnalysisConfig;
use chatwatch_core::{
    AnalysisMode, AnalysisRecord, ChatMessage, ChatwatchError, CompletionProvider,
    ConnectionState, ProviderStatus,
};
use chatwatch_livechat::{ChatHandle, SharedBuffer};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub use analysis::{AnalysisCycle, CycleOutcome, SkipReason};
pub use shutdown::install_signal_handler;
pub use stats::{Statistics, StatisticsReport};

/// Point-in-time view of the bot, served by `/api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct BotStatus {
    pub is_running: bool,
    pub is_paused: bool,
    pub token_address: String,
    pub uptime_seconds: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub last_analysis_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub connection_status: ConnectionState,
    pub completion_client_status: ProviderStatus,
    pub statistics: StatisticsReport,
}

#[derive(Debug)]
struct Started {
    instant: Instant,
    at: DateTime<Utc>,
}

pub struct ChatBot {
    token_address: String,
    chat: ChatHandle,
    buffer: SharedBuffer,
    provider: Arc<dyn CompletionProvider>,
    cycle: AnalysisCycle,
    stats: Arc<Mutex<Statistics>>,
    running: AtomicBool,
    started: OnceLock<Started>,
}

impl ChatBot {
    pub fn new(
        chat: ChatHandle,
        buffer: SharedBuffer,
        provider: Arc<dyn CompletionProvider>,
        token_address: impl Into<String>,
        analysis: &AnalysisConfig,
    ) -> Self {
        let token_address = token_address.into();
        let stats = Arc::new(Mutex::new(Statistics::default()));
        let cycle = AnalysisCycle::new(
            provider.clone(),
            buffer.clone(),
            token_address.clone(),
            analysis,
            stats.clone(),
        );
        Self {
            token_address,
            chat,
            buffer,
            provider,
            cycle,
            stats,
            running: AtomicBool::new(false),
            started: OnceLock::new(),
        }
    }

    /// Check the completion endpoint and mark the bot running.
    ///
    /// A failed self-test is fatal: the bot stays stopped and the error is
    /// returned to the caller.
    pub async fn start(&self) -> Result<(), ChatwatchError> {
        info!(provider = self.provider.name(), "testing completion endpoint");
        if !self.provider.test_connection().await {
            return Err(ChatwatchError::provider(
                "completion endpoint self-test failed",
            ));
        }

        let _ = self.started.set(Started {
            instant: Instant::now(),
            at: Utc::now(),
        });
        self.running.store(true, Ordering::SeqCst);
        info!(token = %self.token_address, "chat bot started");
        Ok(())
    }

    /// Drive the analysis cycle and the connection watcher until cancelled.
    pub async fn run(&self, cancel: CancellationToken) {
        tokio::join!(
            self.cycle.run(cancel.clone()),
            self.watch_connection(cancel)
        );
    }

    async fn watch_connection(&self, cancel: CancellationToken) {
        let mut states = self.chat.subscribe();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = states.changed() => {
                    if changed.is_err() {
                        debug!("chat session closed its state channel");
                        break;
                    }
                    let state = *states.borrow_and_update();
                    if matches!(state, ConnectionState::Backoff { .. } | ConnectionState::Failed) {
                        self.stats.lock().await.record_connection_error();
                        warn!(%state, "chat connection lost");
                    }
                }
            }
        }
    }

    /// Stop analyzing and disconnect from the chat room.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cycle.set_paused(true);
        if let Err(e) = self.chat.pause().await {
            debug!(error = %e, "chat session already gone at stop");
        }
        info!("chat bot stopped");
    }

    pub async fn pause(&self) -> Result<(), ChatwatchError> {
        self.cycle.set_paused(true);
        self.chat.pause().await?;
        info!("chat bot paused");
        Ok(())
    }

    pub async fn resume(&self) -> Result<(), ChatwatchError> {
        self.cycle.set_paused(false);
        self.chat.resume().await?;
        info!("chat bot resumed");
        Ok(())
    }

    /// Switch the analysis mode. Unknown names select [`AnalysisMode::Normal`].
    ///
    /// `music` disconnects the chat; `normal` reconnects it unless the bot
    /// is paused.
    pub async fn change_mode(&self, mode: &str) -> Result<AnalysisMode, ChatwatchError> {
        let mode = AnalysisMode::parse_lenient(mode);
        self.cycle.set_mode(mode);
        if mode.suspends_analysis() {
            self.chat.pause().await?;
        } else if !self.is_paused() {
            self.chat.resume().await?;
        }
        Ok(mode)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        self.cycle.is_paused()
    }

    pub fn mode(&self) -> AnalysisMode {
        self.cycle.mode()
    }

    pub fn token_address(&self) -> &str {
        &self.token_address
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.chat.state()
    }

    pub fn cycle(&self) -> &AnalysisCycle {
        &self.cycle
    }

    /// Time since [`ChatBot::start`]; zero before it.
    pub fn uptime(&self) -> Duration {
        self.started
            .get()
            .map(|s| s.instant.elapsed())
            .unwrap_or_default()
    }

    pub async fn recent_messages(&self, limit: usize) -> Vec<ChatMessage> {
        self.buffer.read().await.tail(limit)
    }

    pub async fn analyses(&self, limit: usize) -> Vec<AnalysisRecord> {
        self.cycle.analyses(limit).await
    }

    pub async fn latest_analysis(&self) -> Option<AnalysisRecord> {
        self.cycle.latest().await
    }

    pub async fn statistics(&self) -> StatisticsReport {
        self.stats.lock().await.report(self.uptime())
    }

    pub async fn status(&self) -> BotStatus {
        let stats = self.stats.lock().await.clone();
        let uptime = self.uptime();
        BotStatus {
            is_running: self.is_running(),
            is_paused: self.is_paused(),
            token_address: self.token_address.clone(),
            uptime_seconds: uptime.as_secs(),
            start_time: self.started.get().map(|s| s.at),
            last_analysis_time: stats.last_analysis,
            last_error: self.cycle.last_error().await,
            connection_status: self.chat.state(),
            completion_client_status: self.provider.status(),
            statistics: stats.report(uptime),
        }
    }
}
