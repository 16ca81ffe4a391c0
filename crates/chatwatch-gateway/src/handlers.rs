// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway API.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chatwatch_agent::{BotStatus, StatisticsReport};
use chatwatch_core::{AnalysisMode, AnalysisRecord, ChatMessage, ChatwatchError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::server::GatewayState;

const DEFAULT_MESSAGE_LIMIT: usize = 50;
const DEFAULT_ANALYSIS_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ModeRequest {
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub mode: AnalysisMode,
    pub data: BotStatus,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<ChatMessage>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub analyses: Vec<AnalysisRecord>,
    pub latest: Option<AnalysisRecord>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: error.into(),
        }),
    )
        .into_response()
}

fn action_result(result: Result<(), ChatwatchError>, message: String) -> Response {
    match result {
        Ok(()) => Json(ActionResponse {
            success: true,
            message,
        })
        .into_response(),
        Err(e) => {
            warn!(error = %e, "control request failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/health
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
    })
}

/// GET /api/status
pub async fn get_status(State(state): State<GatewayState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        success: true,
        mode: state.bot.mode(),
        data: state.bot.status().await,
    })
}

/// GET /api/messages?limit=N
pub async fn get_messages(
    State(state): State<GatewayState>,
    Query(query): Query<LimitQuery>,
) -> Json<MessagesResponse> {
    let messages = state
        .bot
        .recent_messages(query.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT))
        .await;
    Json(MessagesResponse {
        count: messages.len(),
        messages,
    })
}

/// GET /api/analysis?limit=N
pub async fn get_analysis(
    State(state): State<GatewayState>,
    Query(query): Query<LimitQuery>,
) -> Json<AnalysisResponse> {
    let analyses = state
        .bot
        .analyses(query.limit.unwrap_or(DEFAULT_ANALYSIS_LIMIT))
        .await;
    Json(AnalysisResponse {
        count: analyses.len(),
        latest: state.bot.latest_analysis().await,
        analyses,
    })
}

/// GET /api/statistics
pub async fn get_statistics(State(state): State<GatewayState>) -> Json<StatisticsReport> {
    Json(state.bot.statistics().await)
}

/// POST /api/pause
pub async fn post_pause(State(state): State<GatewayState>) -> Response {
    action_result(state.bot.pause().await, "Bot paused".into())
}

/// POST /api/resume
pub async fn post_resume(State(state): State<GatewayState>) -> Response {
    action_result(state.bot.resume().await, "Bot resumed".into())
}

/// POST /api/mode
///
/// The body is parsed by hand so any malformed JSON maps to 400. A missing
/// `mode` field selects `normal`.
pub async fn post_mode(State(state): State<GatewayState>, body: Bytes) -> Response {
    let request: ModeRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {e}"));
        }
    };
    let requested = request.mode.unwrap_or_default();
    match state.bot.change_mode(&requested).await {
        Ok(mode) => action_result(Ok(()), format!("Mode changed to {mode}")),
        Err(e) => action_result(Err(e), String::new()),
    }
}

/// Fallback for unknown paths.
pub async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Endpoint not found")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_request_tolerates_missing_mode() {
        let req: ModeRequest = serde_json::from_str("{}").unwrap();
        assert!(req.mode.is_none());
        let req: ModeRequest = serde_json::from_str(r#"{"mode": "music"}"#).unwrap();
        assert_eq!(req.mode.as_deref(), Some("music"));
    }

    #[test]
    fn health_response_serializes() {
        let json = serde_json::to_value(HealthResponse {
            status: "healthy",
            timestamp: Utc::now(),
        })
        .unwrap();
        assert_eq!(json["status"], "healthy");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn error_envelope_shape() {
        let json = serde_json::to_value(ErrorResponse {
            success: false,
            error: "Endpoint not found".into(),
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": false, "error": "Endpoint not found"})
        );
    }
}
