// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP status and control API for chatwatch.
//!
//! Read endpoints expose the bot status, buffered messages, analysis history
//! and statistics; control endpoints pause, resume and switch the analysis
//! mode.

pub mod handlers;
pub mod server;

pub use server::{GatewayState, ServerConfig, build_router, start_server};
