use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mediarelay_core::error::CoreError;
use mediarelay_worker::{OrchestratorError, RegistryError};
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Only failures known before a job starts end up here. Once a job id has
/// been handed out, its failures travel as terminal events instead.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A synchronous rejection from the orchestrator.
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    /// A search job ran but produced no results.
    #[error("Search failed: {0}")]
    SearchFailed(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

fn internal(detail: &dyn std::fmt::Display) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %detail, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST", msg.clone()),
        CoreError::UnknownAlias { .. } => {
            (StatusCode::BAD_REQUEST, "UNKNOWN_ALIAS", err.to_string())
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Orchestrator(err) => match err {
                OrchestratorError::Core(core) => classify_core_error(core),
                OrchestratorError::Registry(RegistryError::NotFound(id)) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("Job with id {id} not found"),
                ),
                OrchestratorError::Registry(dup @ RegistryError::DuplicateJobId(_)) => {
                    internal(dup)
                }
                OrchestratorError::ShuttingDown => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SHUTTING_DOWN",
                    err.to_string(),
                ),
            },

            AppError::SearchFailed(msg) => (StatusCode::BAD_GATEWAY, "SEARCH_FAILED", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
