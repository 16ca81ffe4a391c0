// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for chatwatch integration tests.
//!
//! - [`MockProvider`] - completion provider with queued replies and call capture

pub mod mock_provider;

pub use mock_provider::{MockProvider, MockReply};
