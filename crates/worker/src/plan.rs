//! Request validation: turns loosely-typed job parameters into a plan.
//!
//! Everything here runs before a job id is allocated, so a rejected
//! request never spawns a subprocess or touches the registry.

use mediarelay_core::alias::resolve_command;
use mediarelay_core::error::CoreError;
use mediarelay_core::tool::{MediaFormat, ToolCommand};
use mediarelay_core::types::{Invocation, JobKind};
use serde::Deserialize;

/// Parameters accepted by [`Orchestrator::start`](crate::Orchestrator::start).
///
/// Which fields are required depends on the job kind:
///
/// | Kind               | Required          | Optional |
/// |--------------------|-------------------|----------|
/// | `Search`           | `query`           |          |
/// | `MediaDownload`    | `url` or `query`  | `format` |
/// | `CommandExecution` | `command`         |          |
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobParameters {
    #[serde(default, alias = "q")]
    pub query: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
}

impl JobParameters {
    pub fn search(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            ..Self::default()
        }
    }

    pub fn download(url: impl Into<String>, format: Option<&str>) -> Self {
        Self {
            url: Some(url.into()),
            format: format.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::default()
        }
    }
}

/// Validated work for one job.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JobPlan {
    Search { query: String },
    Download { source: String, format: MediaFormat },
    Command { invocation: Invocation },
}

impl JobPlan {
    pub(crate) fn prepare(
        kind: JobKind,
        params: JobParameters,
        tool: &ToolCommand,
    ) -> Result<Self, CoreError> {
        match kind {
            JobKind::Search => Ok(Self::Search {
                query: required(params.query, "query")?,
            }),
            JobKind::MediaDownload => {
                let source = non_blank(params.url)
                    .or_else(|| non_blank(params.query))
                    .ok_or_else(|| {
                        CoreError::InvalidRequest("query or url is required".to_string())
                    })?;
                Ok(Self::Download {
                    source,
                    format: MediaFormat::from_param(params.format.as_deref()),
                })
            }
            JobKind::CommandExecution => {
                let command = required(params.command, "command")?;
                Ok(Self::Command {
                    invocation: resolve_command(&command, tool)?,
                })
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, name: &str) -> Result<String, CoreError> {
    non_blank(value).ok_or_else(|| CoreError::InvalidRequest(format!("{name} is required")))
}
