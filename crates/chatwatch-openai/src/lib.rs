// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI completion provider for chatwatch.
//!
//! [`CompletionClient`] implements [`CompletionProvider`] on top of the chat
//! completions API with a minimum spacing between requests, bounded retries
//! with exponential backoff, and a fixed fallback text once retries run out.

pub mod client;
pub mod types;

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chatwatch_config::model::OpenAiConfig;
use chatwatch_core::{AnalysisMode, ChatwatchError, CompletionProvider, ProviderStatus};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use crate::client::OpenAiClient;
use crate::types::{CompletionRequest, RequestMessage};

/// Returned by [`CompletionClient::analyze`] when every attempt failed.
pub const FALLBACK_TEXT: &str = "🎯 Sentiment: neutral
🔥 Key themes: Unable to analyze due to API error
⚠️ Risks: Analysis unavailable
📈 Forecast: Unable to predict due to technical issues";

/// Built-in commentary persona for [`AnalysisMode::Normal`].
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a visitor from a distant planet watching a \
human crypto chat, and you never drop that role. Keep replies short, informal and funny: \
cosmic metaphors, playful sarcasm, no lectures. Serious questions still get a cheerful, \
alien take.
### Reply format
Do not answer every message. Either reply to one message by its author's name or make one \
general remark without naming anyone.";

const CONNECTION_TEST_PROMPT: &str = "Test connection";
const CONNECTION_TEST_MAX_TOKENS: u32 = 10;
const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(1);

/// Enforces a minimum delay between the starts of successive requests.
#[derive(Debug)]
pub struct RateLimiter {
    delay: Duration,
    last_start: Mutex<Option<Instant>>,
    last_wall_ms: AtomicI64,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_start: Mutex::new(None),
            last_wall_ms: AtomicI64::new(i64::MIN),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Sleep until `delay` has passed since the previous start, then mark a new start.
    pub async fn acquire(&self) {
        let mut last = self.last_start.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                let wait = self.delay - elapsed;
                debug!(wait_ms = wait.as_millis() as u64, "rate limiting completion request");
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
        self.last_wall_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    /// Wall-clock time of the most recent start.
    pub fn last_request_time(&self) -> Option<DateTime<Utc>> {
        match self.last_wall_ms.load(Ordering::Relaxed) {
            i64::MIN => None,
            ms => DateTime::from_timestamp_millis(ms),
        }
    }
}

/// Resolve the API key: config first, then `OPENAI_API_KEY`.
pub fn resolve_api_key(config_key: Option<&str>) -> Result<String, ChatwatchError> {
    if let Some(key) = config_key
        && !key.trim().is_empty()
    {
        return Ok(key.to_string());
    }

    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            ChatwatchError::Config(
                "OpenAI API key not found. Set openai.api_key in config or the OPENAI_API_KEY environment variable.".into(),
            )
        })
}

/// Number chat lines as `Message {i}: {line}`, one per line.
pub fn format_lines(lines: &[String]) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("Message {}: {line}", i + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Completion provider with rate limiting, retries and a fallback text.
pub struct CompletionClient {
    client: OpenAiClient,
    model: String,
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
    retry_base: Duration,
    system_prompt: String,
    limiter: RateLimiter,
}

impl CompletionClient {
    /// Build from configuration, resolving the API key.
    pub fn new(config: &OpenAiConfig) -> Result<Self, ChatwatchError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = OpenAiClient::new(&api_key)?.with_base_url(config.base_url.clone());
        info!(model = %config.model, "OpenAI completion client initialized");
        Ok(Self::with_client(client, config))
    }

    /// Build around an existing HTTP client.
    pub fn with_client(client: OpenAiClient, config: &OpenAiConfig) -> Self {
        Self {
            client,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            retry_base: DEFAULT_RETRY_BASE,
            system_prompt: config
                .system_prompt
                .clone()
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            limiter: RateLimiter::new(Duration::from_secs(config.rate_limit_delay_secs)),
        }
    }

    /// Unit of the `2^attempt` backoff between attempts.
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    pub fn with_rate_limit(mut self, delay: Duration) -> Self {
        self.limiter = RateLimiter::new(delay);
        self
    }

    /// System prompt for `mode`; `None` means the mode produces no commentary.
    pub fn prompt_for(&self, mode: AnalysisMode) -> Option<&str> {
        match mode {
            AnalysisMode::Normal => Some(&self.system_prompt),
            AnalysisMode::Music => None,
        }
    }
}

#[async_trait]
impl CompletionProvider for CompletionClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn analyze(
        &self,
        lines: &[String],
        mode: AnalysisMode,
    ) -> Result<Option<String>, ChatwatchError> {
        if lines.is_empty() {
            warn!("no chat lines to analyze");
            return Ok(None);
        }
        let Some(prompt) = self.prompt_for(mode) else {
            debug!(%mode, "mode has no prompt; skipping completion");
            return Ok(None);
        };

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                RequestMessage::system(prompt),
                RequestMessage::user(format_lines(lines)),
            ],
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        };

        self.limiter.acquire().await;

        for attempt in 0..self.max_retries {
            let outcome = match self.client.complete(&request).await {
                Ok(Some(text)) => {
                    info!(lines = lines.len(), attempt = attempt + 1, "chat analyzed");
                    return Ok(Some(text));
                }
                Ok(None) => ChatwatchError::provider("response contained no content"),
                Err(e) => e,
            };
            warn!(attempt = attempt + 1, error = %outcome, "completion attempt failed");

            if attempt + 1 < self.max_retries {
                let wait = self.retry_base * 2u32.saturating_pow(attempt);
                debug!(wait_ms = wait.as_millis() as u64, "retrying completion");
                tokio::time::sleep(wait).await;
            }
        }

        warn!(
            attempts = self.max_retries,
            "completion retries exhausted; using fallback text"
        );
        Ok(Some(FALLBACK_TEXT.to_string()))
    }

    async fn test_connection(&self) -> bool {
        self.limiter.acquire().await;
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![RequestMessage::user(CONNECTION_TEST_PROMPT)],
            max_tokens: CONNECTION_TEST_MAX_TOKENS,
            temperature: None,
        };
        match self.client.complete(&request).await {
            Ok(content) => content.is_some(),
            Err(e) => {
                warn!(error = %e, "OpenAI connection test failed");
                false
            }
        }
    }

    fn status(&self) -> ProviderStatus {
        ProviderStatus {
            api_key_configured: true,
            model: self.model.clone(),
            last_request_time: self.limiter.last_request_time(),
            rate_limit_delay_secs: self.limiter.delay().as_secs_f64(),
        }
    }
}
