//! End-to-end test: a real WebSocket observer receives job events.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use mediarelay_api::forwarder::EventForwarder;
use mediarelay_api::router::build_app_router;
use mediarelay_api::state::AppState;
use mediarelay_core::types::JobKind;
use mediarelay_worker::JobParameters;

#[tokio::test]
async fn observer_receives_job_events_over_websocket() {
    let scratch = tempfile::tempdir().expect("tempdir");
    let config = common::test_config(&scratch, common::FAKE_TOOL);
    let state = AppState::new(config.clone());

    let cancel = CancellationToken::new();
    tokio::spawn(
        EventForwarder::new(Arc::clone(&state.ws_manager))
            .run(state.event_bus.subscribe(), cancel.clone()),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = build_app_router(state.clone(), &config);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .expect("connect");

    // The upgrade completes before the connection is registered.
    tokio::time::timeout(Duration::from_secs(5), async {
        while state.ws_manager.connection_count().await == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("connection registered");

    // Commands run directly, not through the fake tool wrapper.
    let started = state
        .orchestrator
        .start(JobKind::CommandExecution, JobParameters::command("echo hello"))
        .await
        .expect("job started");
    let job_id = started.job_id.to_string();

    let events = tokio::time::timeout(Duration::from_secs(10), async {
        let mut events = Vec::new();
        while let Some(frame) = socket.next().await {
            let Message::Text(text) = frame.expect("frame") else {
                continue;
            };
            let event: serde_json::Value = serde_json::from_str(&text).expect("JSON event");
            if event["jobId"] != job_id.as_str() {
                continue;
            }
            let done = event["message"] == "Command completed successfully";
            events.push(event);
            if done {
                break;
            }
        }
        events
    })
    .await
    .expect("terminal event within timeout");

    assert_eq!(events[0]["type"], "info");
    assert_eq!(events[0]["message"], "Running: echo hello");
    assert!(events.iter().any(|e| e["message"] == "hello"));

    let last = events.last().expect("at least one event");
    assert_eq!(last["type"], "success");
    assert!(last["timestamp"].is_string());
    assert!(last.get("terminal").is_none());

    cancel.cancel();
}
