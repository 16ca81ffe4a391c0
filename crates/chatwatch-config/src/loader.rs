// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Lookup order: `/etc/chatwatch/chatwatch.toml` < `~/.config/chatwatch/chatwatch.toml`
//! < `./chatwatch.toml` < `CHATWATCH_*` variables < legacy flat variables
//! (`OPENAI_API_KEY`, `PUMP_TOKEN_ADDRESS`, ...).

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ChatwatchConfig;

/// Top-level config sections, used to map `CHATWATCH_<SECTION>_<KEY>` names.
const SECTIONS: &[&str] = &["agent", "openai", "chat", "analysis", "gateway"];

/// Flat environment names accepted for compatibility with older deployments,
/// paired with the config path they set.
pub const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("OPENAI_API_KEY", "openai.api_key"),
    ("OPENAI_MODEL", "openai.model"),
    ("CREATIVE", "openai.temperature"),
    ("MAX_RETRIES", "openai.max_retries"),
    ("RATE_LIMIT_DELAY", "openai.rate_limit_delay_secs"),
    ("MAX_TOKEN_ANSVERS", "openai.max_tokens"),
    ("PUMP_TOKEN_ADDRESS", "chat.room_id"),
    ("PUMP_WEBSOCKET_URL", "chat.websocket_url"),
    ("MESSAGE_BUFFER_SIZE", "chat.max_message_length"),
    ("ANALYSIS_INTERVAL", "analysis.interval_secs"),
    ("MAX_ANALYSIS_RESULTS", "analysis.max_results"),
    ("FLASK_HOST", "gateway.host"),
    ("FLASK_PORT", "gateway.port"),
];

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chatwatch/chatwatch.toml`
/// 3. `~/.config/chatwatch/chatwatch.toml`
/// 4. `./chatwatch.toml`
/// 5. `CHATWATCH_*` environment variables
/// 6. Legacy flat environment variables
pub fn load_config() -> Result<ChatwatchConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no file lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ChatwatchConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatwatchConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ChatwatchConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ChatwatchConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .merge(legacy_env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ChatwatchConfig::default()))
        .merge(Toml::file("/etc/chatwatch/chatwatch.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("chatwatch/chatwatch.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chatwatch.toml"))
        .merge(env_provider())
        .merge(legacy_env_provider())
}

/// `CHATWATCH_*` provider with explicit section mapping.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `CHATWATCH_CHAT_MAX_MESSAGE_LENGTH` maps to `chat.max_message_length`.
pub fn env_provider() -> Env {
    Env::prefixed("CHATWATCH_").map(|key| map_section_key(key.as_str()).into())
}

/// Provider for the flat legacy variable names in [`LEGACY_ENV_KEYS`].
pub fn legacy_env_provider() -> Env {
    let names: Vec<&str> = LEGACY_ENV_KEYS.iter().map(|(name, _)| *name).collect();
    Env::raw()
        .only(&names)
        .map(|key| map_legacy_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env key onto its dotted config path.
pub fn map_section_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}

fn map_legacy_key(key: &str) -> String {
    LEGACY_ENV_KEYS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(key))
        .map(|(_, path)| (*path).to_string())
        .unwrap_or_else(|| key.to_ascii_lowercase())
}
