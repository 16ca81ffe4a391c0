// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! pump.fun live chat client.
//!
//! Speaks the Engine.IO v4 / Socket.IO text protocol over a WebSocket, joins a
//! token's chat room, pulls message history, and keeps a bounded buffer of
//! recent messages for the analysis cycle and the HTTP surface.

pub mod ack;
pub mod buffer;
pub mod frame;
pub mod history;
pub mod session;

pub use ack::{AckKind, AckTable, PendingAck};
pub use buffer::{
    BufferUpdate, MessageBuffer, RawMessage, Selection, SharedBuffer, spawn_buffer_writer,
};
pub use frame::{Frame, FrameError, Request};
pub use history::HistoryShape;
pub use session::{
    Action, ChatHandle, ChatProtocol, ChatSession, LiveChat, ReconnectPolicy, SessionCommand,
    SessionConfig, SessionControls, control_channel, spawn_attached,
};
