//! Integration tests for the job endpoints.

mod common;

use std::time::Duration;

use axum::http::StatusCode;
use common::{body_json, delete, get, post_json};
use mediarelay_core::types::Severity;
use mediarelay_events::LogEvent;
use serde_json::json;
use tokio::sync::broadcast;

/// Wait until the job's terminal event shows up on `rx`.
async fn terminal_event(rx: &mut broadcast::Receiver<LogEvent>, job_id: &str) -> LogEvent {
    tokio::time::timeout(Duration::from_secs(15), async {
        loop {
            let event = rx.recv().await.expect("bus open");
            if event.job_id.as_str() == job_id && event.terminal {
                return event;
            }
        }
    })
    .await
    .expect("terminal event within timeout")
}

async fn terminal_message(rx: &mut broadcast::Receiver<LogEvent>, job_id: &str) -> (Severity, String) {
    let event = terminal_event(rx, job_id).await;
    (event.severity, event.message)
}

// ---------------------------------------------------------------------------
// Test: search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_returns_mapped_videos() {
    let app = common::build_test_app();
    let response = get(&app, "/api/v1/search?q=lofi").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let data = &json["data"];

    assert!(data["jobId"].is_string());
    let videos = data["videos"].as_array().expect("videos array");
    assert_eq!(videos.len(), 2);
    assert_eq!(videos[0]["url"], "https://youtube.com/watch?v=abc");
    assert_eq!(videos[0]["timestamp"], "1:01");
    assert_eq!(videos[0]["author"]["name"], "Chan");
    assert_eq!(videos[0]["views"], 5);
    assert_eq!(videos[1]["url"], "https://example.com/def");
}

#[tokio::test]
async fn search_without_query_is_invalid() {
    let app = common::build_test_app();
    let response = get(&app, "/api/v1/search").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn failing_search_is_bad_gateway() {
    let app = common::build_test_app_with_tool("exit 2");
    let response = get(&app, "/api/v1/search?q=x").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "SEARCH_FAILED");
}

// ---------------------------------------------------------------------------
// Test: downloads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn download_is_accepted_and_completes() {
    let app = common::build_test_app();
    let mut rx = app.state.event_bus.subscribe();

    let response = post_json(
        &app,
        "/api/v1/downloads",
        json!({ "url": "https://example.com/v", "format": "mp4" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    let job_id = json["data"]["jobId"].as_str().expect("jobId").to_string();

    let event = terminal_event(&mut rx, &job_id).await;
    assert_eq!(event.severity, Severity::Success);
    assert_eq!(event.message, "Download complete! File: Demo_Clip.webm");
    assert!(app.download_dir.join("Demo_Clip.webm").exists());

    // Observers receive the link in the serialized terminal event, and it
    // resolves against the router.
    let wire = serde_json::to_value(&event).expect("serialize event");
    assert_eq!(wire["download"]["title"], "Demo Clip");
    assert_eq!(wire["download"]["filename"], "Demo_Clip.webm");
    let url = wire["download"]["downloadUrl"].as_str().expect("downloadUrl");
    assert_eq!(url, "/downloads/Demo_Clip.webm");

    let response = get(&app, url).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn download_without_source_is_invalid() {
    let app = common::build_test_app();
    let response = post_json(&app, "/api/v1/downloads", json!({ "format": "mp3" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_REQUEST");
    assert!(app.state.orchestrator.registry().is_empty().await);
}

// ---------------------------------------------------------------------------
// Test: commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_alias_is_rejected() {
    let app = common::build_test_app();
    let response = post_json(&app, "/api/v1/commands", json!({ "command": "tool:explode" })).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "UNKNOWN_ALIAS");
}

#[tokio::test]
async fn missing_executable_is_accepted_then_fails() {
    let app = common::build_test_app();
    let mut rx = app.state.event_bus.subscribe();

    let response = post_json(
        &app,
        "/api/v1/commands",
        json!({ "command": "no-such-binary-mediarelay hello" }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job_id = body_json(response).await["data"]["jobId"]
        .as_str()
        .expect("jobId")
        .to_string();

    let (severity, message) = terminal_message(&mut rx, &job_id).await;
    assert_eq!(severity, Severity::Error);
    assert!(message.contains("command not found"));
}

// ---------------------------------------------------------------------------
// Test: listing and cancellation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn running_jobs_are_listed_and_cancellable() {
    let app = common::build_test_app();
    let mut rx = app.state.event_bus.subscribe();

    let response = post_json(&app, "/api/v1/commands", json!({ "command": "sleep 30" })).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let job_id = body_json(response).await["data"]["jobId"]
        .as_str()
        .expect("jobId")
        .to_string();

    let list = body_json(get(&app, "/api/v1/jobs").await).await;
    let jobs = list["data"].as_array().expect("jobs array");
    assert!(jobs
        .iter()
        .any(|j| j["jobId"] == job_id.as_str() && j["kind"] == "command_execution"));

    let health = body_json(get(&app, "/health").await).await;
    assert_eq!(health["activeJobs"], 1);

    let response = delete(&app, &format!("/api/v1/jobs/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (severity, message) = terminal_message(&mut rx, &job_id).await;
    assert_eq!(severity, Severity::Error);
    assert_eq!(message, "Job terminated");
}

#[tokio::test]
async fn cancelling_unknown_job_is_404() {
    let app = common::build_test_app();
    let response = delete(&app, "/api/v1/jobs/not-a-job").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Test: shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn starting_during_shutdown_is_unavailable() {
    let app = common::build_test_app();
    app.state.orchestrator.shutdown(Duration::from_secs(1)).await;

    let response = post_json(&app, "/api/v1/commands", json!({ "command": "echo hi" })).await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "SHUTTING_DOWN");
    assert!(app.state.orchestrator.registry().is_empty().await);
}
