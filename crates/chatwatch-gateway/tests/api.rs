// SPDX-FileCopyrightText: 2026 Chatwatch Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route-level tests for the gateway API.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chatwatch_agent::ChatBot;
use chatwatch_config::model::AnalysisConfig;
use chatwatch_core::AnalysisMode;
use chatwatch_gateway::{GatewayState, build_router};
use chatwatch_livechat::{
    MessageBuffer, RawMessage, SessionCommand, SessionControls, control_channel,
};
use chatwatch_test_utils::MockProvider;
use serde_json::Value;
use tokio::time::Instant;
use tower::ServiceExt;

struct Fixture {
    app: Router,
    bot: Arc<ChatBot>,
    controls: SessionControls,
}

async fn fixture(messages: &[(&str, &str)]) -> Fixture {
    let (handle, controls) = control_channel();
    let buffer = MessageBuffer::shared(100, 100);
    {
        let mut guard = buffer.write().await;
        for (user, text) in messages {
            guard.ingest(RawMessage::new(Some(*user), *text));
        }
    }
    let analysis = AnalysisConfig {
        interval_secs: 5,
        max_results: 10,
        max_batch: 6,
    };
    let bot = Arc::new(ChatBot::new(
        handle,
        buffer,
        Arc::new(MockProvider::with_responses(vec!["to the stars".into()])),
        "TokenAddr",
        &analysis,
    ));
    Fixture {
        app: build_router(GatewayState { bot: bot.clone() }),
        bot,
        controls,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

#[tokio::test]
async fn health_is_unwrapped() {
    let f = fixture(&[]).await;
    let (status, json) = send(&f.app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn status_reports_mode_and_bot_state() {
    let f = fixture(&[]).await;
    let (status, json) = send(&f.app, get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["mode"], "normal");
    let data = &json["data"];
    assert_eq!(data["token_address"], "TokenAddr");
    assert_eq!(data["is_running"], false);
    assert_eq!(data["connection_status"]["state"], "disconnected");
    assert_eq!(data["completion_client_status"]["model"], "mock-model");
    assert_eq!(data["statistics"]["success_rate"], 100.0);
}

#[tokio::test]
async fn messages_default_and_explicit_limit() {
    let f = fixture(&[("bob", "gm"), ("amy", "wagmi"), ("eve", "ser")]).await;

    let (_, json) = send(&f.app, get("/api/messages")).await;
    assert_eq!(json["count"], 3);
    assert_eq!(json["messages"][0]["username"], "bob");

    let (_, json) = send(&f.app, get("/api/messages?limit=2")).await;
    assert_eq!(json["count"], 2);
    assert_eq!(json["messages"][0]["username"], "amy");
    assert_eq!(json["messages"][1]["text"], "ser");
}

#[tokio::test]
async fn analysis_lists_records_and_latest() {
    let f = fixture(&[("bob", "gm")]).await;
    let (_, json) = send(&f.app, get("/api/analysis")).await;
    assert_eq!(json["count"], 0);
    assert!(json["latest"].is_null());

    f.bot.cycle().process_cycle(Instant::now()).await;

    let (_, json) = send(&f.app, get("/api/analysis?limit=5")).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["latest"]["analysis"], "to the stars");
    assert_eq!(json["analyses"][0]["token_address"], "TokenAddr");

    let (_, json) = send(&f.app, get("/api/statistics")).await;
    assert_eq!(json["analyses_performed"], 1);
    assert_eq!(json["messages_received"], 1);
    assert_eq!(json["uptime_formatted"], "00:00:00");
}

#[tokio::test]
async fn pause_and_resume_forward_to_session() {
    let mut f = fixture(&[]).await;

    let (status, json) = send(&f.app, Request::post("/api/pause").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!({"success": true, "message": "Bot paused"}));
    assert!(f.bot.is_paused());
    assert_eq!(f.controls.try_recv(), Some(SessionCommand::Pause));

    let (_, json) = send(&f.app, Request::post("/api/resume").body(Body::empty()).unwrap()).await;
    assert_eq!(json["message"], "Bot resumed");
    assert_eq!(f.controls.try_recv(), Some(SessionCommand::Resume));
}

#[tokio::test]
async fn mode_switch_and_bad_body() {
    let mut f = fixture(&[]).await;

    let (status, json) = send(&f.app, post_json("/api/mode", r#"{"mode": "music"}"#)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "Mode changed to music");
    assert_eq!(f.bot.mode(), AnalysisMode::Music);
    assert_eq!(f.controls.try_recv(), Some(SessionCommand::Pause));

    let (_, json) = send(&f.app, post_json("/api/mode", "{}")).await;
    assert_eq!(json["message"], "Mode changed to normal");

    let (status, json) = send(&f.app, post_json("/api/mode", "mode=music")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(f.bot.mode(), AnalysisMode::Normal);
}

#[tokio::test]
async fn control_errors_when_session_is_gone() {
    let Fixture { app, controls, .. } = fixture(&[]).await;
    drop(controls);
    let (status, json) = send(&app, Request::post("/api/pause").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn unknown_path_is_json_404() {
    let f = fixture(&[]).await;
    let (status, json) = send(&f.app, get("/api/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        json,
        serde_json::json!({"success": false, "error": "Endpoint not found"})
    );
}

#[tokio::test]
async fn cors_is_permissive() {
    let f = fixture(&[]).await;
    let request = Request::get("/api/health")
        .header(header::ORIGIN, "https://example.com")
        .body(Body::empty())
        .unwrap();
    let response = f.app.clone().oneshot(request).await.unwrap();
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}
