// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatwatch check`: confirm the completion endpoint answers with the
//! loaded configuration.

use chatwatch_config::ChatwatchConfig;
use chatwatch_core::{ChatwatchError, CompletionProvider};
use chatwatch_openai::CompletionClient;

pub async fn run_check(config: &ChatwatchConfig) -> Result<(), ChatwatchError> {
    let client = CompletionClient::new(&config.openai)?;
    if !client.test_connection().await {
        return Err(ChatwatchError::provider(format!(
            "completion endpoint self-test failed (model={}, base_url={})",
            config.openai.model, config.openai.base_url
        )));
    }
    println!(
        "chatwatch: config ok, completion endpoint reachable (model={}, room={})",
        config.openai.model,
        config.chat.room_id.as_deref().unwrap_or("-")
    );
    Ok(())
}
