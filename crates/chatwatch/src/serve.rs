// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatwatch serve`: wire the chat session, analysis cycle and HTTP API,
//! then run until SIGINT/SIGTERM.

use std::sync::Arc;

use chatwatch_agent::{ChatBot, install_signal_handler};
use chatwatch_config::ChatwatchConfig;
use chatwatch_core::{ChatwatchError, CompletionProvider};
use chatwatch_gateway::{GatewayState, ServerConfig, start_server};
use chatwatch_livechat::{MessageBuffer, SessionConfig, control_channel, spawn_attached};
use chatwatch_openai::CompletionClient;
use tracing::{error, info};

pub async fn run_serve(config: ChatwatchConfig) -> Result<(), ChatwatchError> {
    info!(version = env!("CARGO_PKG_VERSION"), "starting chatwatch");

    let provider: Arc<dyn CompletionProvider> = Arc::new(CompletionClient::new(&config.openai)?);
    let session = SessionConfig::from_config(&config.chat)?;
    let buffer = MessageBuffer::shared(config.chat.history_limit, config.chat.max_message_length);

    let (handle, controls) = control_channel();
    let bot = Arc::new(ChatBot::new(
        handle,
        buffer.clone(),
        provider,
        session.room_id.clone(),
        &config.analysis,
    ));
    bot.start().await?;

    let cancel = install_signal_handler();
    let (session_task, writer_task) = spawn_attached(session, buffer, controls, cancel.clone());
    let bot_task = tokio::spawn({
        let bot = bot.clone();
        let cancel = cancel.clone();
        async move { bot.run(cancel).await }
    });

    let server_config = ServerConfig::from(&config.gateway);
    let result = start_server(&server_config, GatewayState { bot: bot.clone() }, cancel.clone()).await;
    if let Err(e) = &result {
        error!(error = %e, "gateway failed; shutting down");
    }

    cancel.cancel();
    bot.stop().await;
    let (bot_done, session_done, writer_done) = tokio::join!(bot_task, session_task, writer_task);
    for (task, done) in [
        ("analysis", bot_done),
        ("session", session_done),
        ("buffer writer", writer_done),
    ] {
        if let Err(e) = done {
            error!(task, error = %e, "task ended abnormally");
        }
    }

    info!("chatwatch stopped");
    result
}
