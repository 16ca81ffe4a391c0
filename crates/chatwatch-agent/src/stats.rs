// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running counters and the derived statistics report.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    pub messages_received: u64,
    pub analyses_performed: u64,
    pub api_errors: u64,
    pub connection_errors: u64,
    pub last_analysis: Option<DateTime<Utc>>,
}

/// Snapshot served by `/api/statistics` and embedded in the bot status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsReport {
    pub messages_received: u64,
    pub analyses_performed: u64,
    pub api_errors: u64,
    pub connection_errors: u64,
    pub last_analysis: Option<DateTime<Utc>>,
    pub uptime_seconds: u64,
    pub uptime_formatted: String,
    pub messages_per_minute: f64,
    pub analyses_per_minute: f64,
    pub success_rate: f64,
}

impl Statistics {
    pub fn record_messages(&mut self, count: usize) {
        self.messages_received += count as u64;
    }

    pub fn record_analysis(&mut self, at: DateTime<Utc>) {
        self.analyses_performed += 1;
        self.last_analysis = Some(at);
    }

    pub fn record_api_error(&mut self) {
        self.api_errors += 1;
    }

    pub fn record_connection_error(&mut self) {
        self.connection_errors += 1;
    }

    /// Percentage of completion calls that produced a record. 100 before any call.
    pub fn success_rate(&self) -> f64 {
        let attempts = self.analyses_performed + self.api_errors;
        if attempts == 0 {
            return 100.0;
        }
        self.analyses_performed as f64 / attempts as f64 * 100.0
    }

    pub fn report(&self, uptime: Duration) -> StatisticsReport {
        let seconds = uptime.as_secs_f64();
        let per_minute = |count: u64| {
            if seconds > 0.0 {
                count as f64 / seconds * 60.0
            } else {
                0.0
            }
        };

        StatisticsReport {
            messages_received: self.messages_received,
            analyses_performed: self.analyses_performed,
            api_errors: self.api_errors,
            connection_errors: self.connection_errors,
            last_analysis: self.last_analysis,
            uptime_seconds: uptime.as_secs(),
            uptime_formatted: format_uptime(uptime),
            messages_per_minute: per_minute(self.messages_received),
            analyses_per_minute: per_minute(self.analyses_performed),
            success_rate: self.success_rate(),
        }
    }
}

/// `HH:MM:SS`; hours keep growing past a day.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
