// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Trait seams between the analysis cycle and its backends.
//!
//! Traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod provider;

pub use provider::CompletionProvider;
