pub mod health;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /search?q=                  run a search and wait for its results (GET)
/// /downloads                  start a media download (POST)
/// /commands                   start a command execution (POST)
/// /jobs                       list running jobs (GET)
/// /jobs/{id}                  terminate a running job (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().merge(jobs::router())
}
