// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level chatwatch configuration.
///
/// Every section is optional and defaults to the values below.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatwatchConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Completion endpoint settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Live chat connection and buffer settings.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Analysis cycle settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// HTTP status/control surface settings.
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Process-wide configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// OpenAI-compatible completion endpoint configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API key. `None` falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for commentary.
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL, without the `/chat/completions` suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sampling temperature ("creativity").
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens per commentary.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Total attempts per analysis before the fallback text is used.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Minimum seconds between two request starts.
    #[serde(default = "default_rate_limit_delay_secs")]
    pub rate_limit_delay_secs: u64,

    /// Overrides the built-in commentary persona.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[redacted]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("rate_limit_delay_secs", &self.rate_limit_delay_secs)
            .field("system_prompt", &self.system_prompt.is_some())
            .finish()
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            rate_limit_delay_secs: default_rate_limit_delay_secs(),
            system_prompt: None,
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_temperature() -> f32 {
    1.0
}

fn default_max_tokens() -> u32 {
    50
}

fn default_max_retries() -> u32 {
    2
}

fn default_rate_limit_delay_secs() -> u64 {
    1
}

/// Live chat connection and message buffer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Chat room to join (the token address). Required at startup.
    #[serde(default)]
    pub room_id: Option<String>,

    /// Socket.IO WebSocket endpoint.
    #[serde(default = "default_websocket_url")]
    pub websocket_url: String,

    /// Origin header and namespace-connect origin.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Username sent with join and send requests.
    #[serde(default = "default_username")]
    pub username: String,

    /// Messages longer than this many characters are truncated at ingestion.
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,

    /// Maximum number of messages kept in the buffer.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Consecutive failed connections before the session gives up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Upper bound for the reconnect delay.
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            room_id: None,
            websocket_url: default_websocket_url(),
            origin: default_origin(),
            username: default_username(),
            max_message_length: default_max_message_length(),
            history_limit: default_history_limit(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            max_backoff_secs: default_max_backoff_secs(),
        }
    }
}

fn default_websocket_url() -> String {
    "wss://livechat.pump.fun/socket.io/?EIO=4&transport=websocket".to_string()
}

fn default_origin() -> String {
    "https://pump.fun".to_string()
}

fn default_username() -> String {
    "anonymous".to_string()
}

fn default_max_message_length() -> usize {
    100
}

fn default_history_limit() -> usize {
    100
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_max_backoff_secs() -> u64 {
    30
}

/// Analysis cycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnalysisConfig {
    /// Seconds between cycles, also the minimum spacing between completion calls.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Number of analysis records kept in memory.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Upper bound on messages per batch (further capped by `interval_secs`).
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_results: default_max_results(),
            max_batch: default_max_batch(),
        }
    }
}

fn default_interval_secs() -> u64 {
    5
}

fn default_max_results() -> usize {
    50
}

fn default_max_batch() -> usize {
    6
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ChatwatchConfig::default();
        assert_eq!(config.openai.model, "gpt-4o-mini");
        assert_eq!(config.openai.max_retries, 2);
        assert_eq!(config.openai.max_tokens, 50);
        assert_eq!(config.chat.history_limit, 100);
        assert_eq!(config.chat.max_message_length, 100);
        assert_eq!(config.chat.max_reconnect_attempts, 5);
        assert_eq!(config.chat.max_backoff_secs, 30);
        assert_eq!(config.analysis.interval_secs, 5);
        assert_eq!(config.analysis.max_results, 50);
        assert_eq!(config.analysis.max_batch, 6);
        assert_eq!(config.gateway.port, 5000);
        assert!(config.chat.room_id.is_none());
    }

    #[test]
    fn openai_debug_redacts_api_key() {
        let config = OpenAiConfig {
            api_key: Some("sk-secret".into()),
            ..OpenAiConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[redacted]"));
    }
}
