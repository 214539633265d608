//! Handlers for job submission and control.
//!
//! Downloads and commands answer `202 Accepted` with the job id as soon as
//! the job is registered; progress and the final result arrive over the
//! WebSocket event tail. Search waits for its job and returns the results
//! inline.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use mediarelay_core::search::SearchResult;
use mediarelay_core::types::{JobId, JobKind};
use mediarelay_worker::{JobParameters, JobResult, JobState, JobSummary};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Query string for `GET /search`.
#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub job_id: JobId,
    pub videos: Vec<SearchResult>,
}

/// Body of a `202 Accepted` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobAccepted {
    pub job_id: JobId,
}

/// Body of `POST /downloads`.
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub url: Option<String>,
    pub q: Option<String>,
    pub format: Option<String>,
}

/// Body of `POST /commands`.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Start a job and answer 202 with its id.
async fn accept(
    state: &AppState,
    kind: JobKind,
    params: JobParameters,
) -> AppResult<impl IntoResponse> {
    let started = state.orchestrator.start(kind, params).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: JobAccepted {
                job_id: started.job_id,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// GET /api/v1/search?q=
///
/// Runs a search job and waits for it. Returns 502 if the tool fails or
/// its output cannot be decoded.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<DataResponse<SearchResponse>>> {
    let params = JobParameters {
        query: query.q,
        ..JobParameters::default()
    };
    let started = state.orchestrator.start(JobKind::Search, params).await?;
    let job_id = started.job_id.clone();

    let outcome = started
        .wait()
        .await
        .ok_or_else(|| AppError::InternalError(format!("search job {job_id} was lost")))?;

    match outcome.result {
        Some(JobResult::Search { results }) => Ok(Json(DataResponse {
            data: SearchResponse {
                job_id,
                videos: results,
            },
        })),
        _ => {
            let reason = match outcome.state {
                JobState::Failed(reason) => reason.to_string(),
                JobState::Terminated => "search was terminated".to_string(),
                other => format!("unexpected state {other:?}"),
            };
            tracing::warn!(job_id = %job_id, %reason, "Search failed");
            Err(AppError::SearchFailed(reason))
        }
    }
}

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

/// POST /api/v1/downloads
///
/// Start a media download. Either `url` or `q` is required; `format` is
/// `mp3` or anything else for mp4.
pub async fn start_download(
    State(state): State<AppState>,
    Json(input): Json<DownloadRequest>,
) -> AppResult<impl IntoResponse> {
    let params = JobParameters {
        query: input.q,
        url: input.url,
        format: input.format,
        ..JobParameters::default()
    };
    accept(&state, JobKind::MediaDownload, params).await
}

/// POST /api/v1/commands
///
/// Start an ad-hoc command. The command is split on whitespace and run
/// without a shell; `pkg:` and `tool:` aliases are expanded first.
pub async fn run_command(
    State(state): State<AppState>,
    Json(input): Json<CommandRequest>,
) -> AppResult<impl IntoResponse> {
    let params = JobParameters {
        command: input.command,
        ..JobParameters::default()
    };
    accept(&state, JobKind::CommandExecution, params).await
}

// ---------------------------------------------------------------------------
// List / cancel
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<DataResponse<Vec<JobSummary>>> {
    Json(DataResponse {
        data: state.orchestrator.running_jobs().await,
    })
}

/// DELETE /api/v1/jobs/{id}
///
/// Signal a running job to terminate. Returns 204; the job reports its
/// end through a terminal event. 404 if no such job is running.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state.orchestrator.cancel(&JobId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
