// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for chatwatch.
//!
//! This crate provides the error type, the data model shared between the
//! chat session, the analysis cycle and the HTTP surface, and the
//! [`CompletionProvider`] trait that completion backends implement.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ChatwatchError;
pub use traits::CompletionProvider;
pub use types::{
    AnalysisMode, AnalysisRecord, ChatMessage, ConnectionState, ProviderStatus, UNKNOWN_USERNAME,
};
