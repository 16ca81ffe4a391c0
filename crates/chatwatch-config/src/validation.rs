// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Both validators collect every failure instead of stopping at the first.

use crate::diagnostic::ConfigError;
use crate::model::ChatwatchConfig;

/// Validate semantic constraints that serde cannot express.
pub fn validate_config(config: &ChatwatchConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.gateway.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("gateway.host must not be empty"));
    } else if host.parse::<std::net::IpAddr>().is_err()
        && !host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        errors.push(ConfigError::validation(format!(
            "gateway.host `{host}` is not a valid IP address or hostname"
        )));
    }

    if config.analysis.interval_secs == 0 {
        errors.push(ConfigError::validation(
            "analysis.interval_secs must be at least 1",
        ));
    }

    for (name, value) in [
        ("analysis.max_results", config.analysis.max_results),
        ("analysis.max_batch", config.analysis.max_batch),
        ("chat.history_limit", config.chat.history_limit),
        ("chat.max_message_length", config.chat.max_message_length),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!(
                "{name} must be at least 1"
            )));
        }
    }

    if config.openai.max_retries == 0 {
        errors.push(ConfigError::validation("openai.max_retries must be at least 1"));
    }

    if config.openai.max_tokens == 0 {
        errors.push(ConfigError::validation("openai.max_tokens must be at least 1"));
    }

    let temperature = config.openai.temperature;
    if !(0.0..=2.0).contains(&temperature) {
        errors.push(ConfigError::validation(format!(
            "openai.temperature must be within [0, 2], got {temperature}"
        )));
    }

    let url = config.chat.websocket_url.trim();
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        errors.push(ConfigError::validation(format!(
            "chat.websocket_url `{url}` must use the ws:// or wss:// scheme"
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks required before `serve` can start: the API key (from config or
/// `OPENAI_API_KEY`) and the chat room.
pub fn validate_startup(config: &ChatwatchConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let has_key = config
        .openai
        .api_key
        .as_deref()
        .is_some_and(|k| !k.trim().is_empty())
        || std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.trim().is_empty());
    if !has_key {
        errors.push(ConfigError::MissingKey {
            key: "openai.api_key".to_string(),
            hint: "set `api_key` under [openai] or export OPENAI_API_KEY".to_string(),
        });
    }

    if !config
        .chat
        .room_id
        .as_deref()
        .is_some_and(|r| !r.trim().is_empty())
    {
        errors.push(ConfigError::MissingKey {
            key: "chat.room_id".to_string(),
            hint: "set `room_id` under [chat] or export PUMP_TOKEN_ADDRESS".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
