// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion provider trait for language-model backends.

use async_trait::async_trait;

use crate::error::ChatwatchError;
use crate::types::{AnalysisMode, ProviderStatus};

/// A language-model endpoint that turns a batch of chat lines into commentary.
#[async_trait]
pub trait CompletionProvider: Send + Sync + 'static {
    /// Returns the human-readable name of this provider.
    fn name(&self) -> &str;

    /// Produces commentary for `lines` in the given mode.
    ///
    /// Returns `Ok(None)` when there is nothing to send (no lines, or the
    /// mode has no prompt). Implementations absorb transient endpoint
    /// failures themselves; an `Err` means the request could not be made.
    async fn analyze(
        &self,
        lines: &[String],
        mode: AnalysisMode,
    ) -> Result<Option<String>, ChatwatchError>;

    /// Connectivity self-test used at startup.
    async fn test_connection(&self) -> bool;

    /// Current status snapshot for the HTTP surface.
    fn status(&self) -> ProviderStatus;
}
