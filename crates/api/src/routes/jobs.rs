//! Route definitions for job submission and control.

use axum::routing::{delete, get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Routes mounted under `/api/v1`.
///
/// ```text
/// GET    /search          -> search
/// POST   /downloads       -> start_download
/// POST   /commands        -> run_command
/// GET    /jobs            -> list_jobs
/// DELETE /jobs/{id}       -> cancel_job
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search", get(jobs::search))
        .route("/downloads", post(jobs::start_download))
        .route("/commands", post(jobs::run_command))
        .route("/jobs", get(jobs::list_jobs))
        .route("/jobs/{id}", delete(jobs::cancel_job))
}
