// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the chatwatch configuration system.

use chatwatch_config::diagnostic::ConfigError;
use chatwatch_config::{load_and_validate_str, load_config, load_config_from_str};
use figment::Jail;
use serial_test::serial;

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[agent]
log_level = "debug"

[openai]
api_key = "sk-test"
model = "gpt-4o"
temperature = 0.7
max_tokens = 80
max_retries = 3
rate_limit_delay_secs = 2

[chat]
room_id = "9BB6NFEcjBCtnNLFko2FqVQBq8HHM13kCyYcdQbgpump"
username = "watcher"
history_limit = 200

[analysis]
interval_secs = 10
max_results = 20

[gateway]
host = "127.0.0.1"
port = 8080
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.log_level, "debug");
    assert_eq!(config.openai.api_key.as_deref(), Some("sk-test"));
    assert_eq!(config.openai.model, "gpt-4o");
    assert!((config.openai.temperature - 0.7).abs() < f32::EPSILON);
    assert_eq!(config.openai.max_retries, 3);
    assert_eq!(
        config.chat.room_id.as_deref(),
        Some("9BB6NFEcjBCtnNLFko2FqVQBq8HHM13kCyYcdQbgpump")
    );
    assert_eq!(config.chat.username, "watcher");
    assert_eq!(config.chat.history_limit, 200);
    assert_eq!(config.chat.max_message_length, 100);
    assert_eq!(config.analysis.interval_secs, 10);
    assert_eq!(config.analysis.max_batch, 6);
    assert_eq!(config.gateway.port, 8080);
}

#[test]
fn empty_toml_uses_defaults() {
    let config = load_config_from_str("").expect("empty TOML should use defaults");
    assert_eq!(config.openai.model, "gpt-4o-mini");
    assert_eq!(config.gateway.host, "0.0.0.0");
    assert_eq!(config.gateway.port, 5000);
    assert!(config.chat.websocket_url.starts_with("wss://livechat.pump.fun"));
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[chat]
rom_id = "abc"
"#;

    let errors = load_and_validate_str(toml).expect_err("should reject unknown key");
    let found = errors.iter().any(|e| {
        matches!(e, ConfigError::UnknownKey { key, suggestion, valid_keys, .. }
            if key == "rom_id"
                && suggestion.as_deref() == Some("room_id")
                && valid_keys.contains("websocket_url"))
    });
    assert!(found, "expected UnknownKey for rom_id, got: {errors:?}");
}

#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[flask]\ndebug = true\n").expect_err("unknown section");
    assert!(err.to_string().contains("flask") || err.to_string().contains("unknown field"));
}

#[test]
fn invalid_type_is_reported() {
    let toml = r#"
[gateway]
port = "eighty"
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject string port");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("port"))),
        "got: {errors:?}"
    );
}

#[test]
fn validation_errors_surface_through_loader() {
    let toml = r#"
[analysis]
interval_secs = 0
"#;
    let errors = load_and_validate_str(toml).expect_err("zero interval rejected");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("interval_secs")))
    );
}

#[test]
fn diagnostic_renders_with_miette() {
    use miette::{Diagnostic, GraphicalReportHandler};

    let error = ConfigError::UnknownKey {
        key: "rom_id".to_string(),
        suggestion: Some("room_id".to_string()),
        valid_keys: "room_id, websocket_url".to_string(),
        span: None,
        src: None,
    };
    assert!(error.code().is_some());
    assert!(error.help().unwrap().to_string().contains("did you mean `room_id`"));

    let mut buf = String::new();
    GraphicalReportHandler::new()
        .render_report(&mut buf, &error)
        .expect("should render");
    assert!(buf.contains("rom_id"));
}

#[test]
#[serial]
fn prefixed_env_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "chatwatch.toml",
            r#"
[chat]
room_id = "from-file"
history_limit = 10
"#,
        )?;
        jail.set_env("CHATWATCH_CHAT_HISTORY_LIMIT", "42");
        jail.set_env("CHATWATCH_OPENAI_MAX_RETRIES", "4");

        let config = load_config()?;
        assert_eq!(config.chat.room_id.as_deref(), Some("from-file"));
        assert_eq!(config.chat.history_limit, 42);
        assert_eq!(config.openai.max_retries, 4);
        Ok(())
    });
}

#[test]
#[serial]
fn legacy_env_names_are_honored() {
    Jail::expect_with(|jail| {
        jail.set_env("PUMP_TOKEN_ADDRESS", "legacyRoomPump");
        jail.set_env("OPENAI_MODEL", "gpt-4.1-mini");
        jail.set_env("FLASK_PORT", "5055");
        jail.set_env("ANALYSIS_INTERVAL", "9");
        jail.set_env("MAX_TOKEN_ANSVERS", "120");

        let config = load_config()?;
        assert_eq!(config.chat.room_id.as_deref(), Some("legacyRoomPump"));
        assert_eq!(config.openai.model, "gpt-4.1-mini");
        assert_eq!(config.gateway.port, 5055);
        assert_eq!(config.analysis.interval_secs, 9);
        assert_eq!(config.openai.max_tokens, 120);
        Ok(())
    });
}

#[test]
#[serial]
fn legacy_names_win_over_prefixed() {
    Jail::expect_with(|jail| {
        jail.set_env("CHATWATCH_GATEWAY_HOST", "10.0.0.1");
        jail.set_env("FLASK_HOST", "127.0.0.1");

        let config = load_config()?;
        assert_eq!(config.gateway.host, "127.0.0.1");
        Ok(())
    });
}
