#![allow(dead_code)]

use std::path::PathBuf;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use mediarelay_api::config::ServerConfig;
use mediarelay_api::router::build_app_router;
use mediarelay_api::state::AppState;
use mediarelay_core::tool::ToolCommand;

/// Stand-in for the retrieval tool: a search mode printing two hits and a
/// download mode that "produces" a `.webm` next to the requested output.
pub const FAKE_TOOL: &str = r#"
case "$1" in
  --dump-json)
    if [ "$2" = "--flat-playlist" ]; then
      echo '{"id":"abc","title":"First","duration":61,"channel":"Chan","view_count":5}'
      echo '{"id":"def","title":"Second","url":"https://example.com/def"}'
    else
      echo '{"title":"Demo Clip"}'
    fi
    ;;
  *)
    out=""
    while [ $# -gt 0 ]; do
      if [ "$1" = "-o" ]; then out="$2"; fi
      shift
    done
    echo "[download]  10.0% of 1.00MiB"
    touch "${out%.*}.webm"
    ;;
esac
"#;

/// A router wired to a fake tool in a scratch directory.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub download_dir: PathBuf,
    _scratch: TempDir,
}

/// Build a test `ServerConfig` rooted in `scratch`, launching `script`
/// as the retrieval tool.
pub fn test_config(scratch: &TempDir, script: &str) -> ServerConfig {
    let script_path = scratch.path().join("fake-tool.sh");
    std::fs::write(&script_path, script).expect("write fake tool");

    let download_dir = scratch.path().join("downloads");
    let public_dir = scratch.path().join("public");
    std::fs::create_dir_all(&download_dir).expect("create download dir");
    std::fs::create_dir_all(&public_dir).expect("create public dir");
    std::fs::write(public_dir.join("index.html"), "<h1>mediarelay</h1>").expect("write index");

    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        download_dir,
        public_dir,
        tool: ToolCommand::new("sh").with_leading_args([script_path.to_string_lossy().into_owned()]),
        search_result_limit: 10,
    }
}

/// Build the full application router with the production middleware stack.
pub fn build_test_app_with_tool(script: &str) -> TestApp {
    let scratch = tempfile::tempdir().expect("tempdir");
    let config = test_config(&scratch, script);
    let download_dir = config.download_dir.clone();
    let state = AppState::new(config.clone());

    TestApp {
        router: build_app_router(state.clone(), &config),
        state,
        download_dir,
        _scratch: scratch,
    }
}

pub fn build_test_app() -> TestApp {
    build_test_app_with_tool(FAKE_TOOL)
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: &TestApp, request: Request<Body>) -> Response<Body> {
    app.router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible")
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    send(app, request).await
}

pub async fn post_json(app: &TestApp, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("valid request");
    send(app, request).await
}

pub async fn delete(app: &TestApp, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .expect("valid request");
    send(app, request).await
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("JSON body")
}
