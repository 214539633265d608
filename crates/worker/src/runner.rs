//! Per-job driver.
//!
//! A [`Job`] owns everything one job needs while it runs: its termination
//! token, its event emitter and its state. [`Job::run`] executes the plan,
//! publishes exactly one terminal event, removes the job from the
//! registry, and returns the outcome.

use std::sync::Arc;

use mediarelay_core::artifact::resolve_artifact;
use mediarelay_core::naming::sanitize_title;
use mediarelay_core::search::parse_search_output;
use mediarelay_core::tool::{download_args, info_args, search_args, MediaFormat, VideoInfo};
use mediarelay_core::types::{Invocation, JobId, JobKind, Severity};
use mediarelay_events::DownloadLink;
use tokio_util::sync::CancellationToken;

use crate::emitter::JobEmitter;
use crate::job::{download_url, FailureReason, JobOutcome, JobResult, JobState};
use crate::orchestrator::OrchestratorConfig;
use crate::plan::JobPlan;
use crate::process::{run_process, ProcessContext, ProcessReport, ProcessStatus, StdoutMode};
use crate::registry::JobRegistry;

/// Terminal event message for a cancelled job.
pub(crate) const TERMINATED_MESSAGE: &str = "Job terminated";

/// How a job ended, plus its terminal event.
struct Completion {
    state: JobState,
    result: Option<JobResult>,
    severity: Severity,
    message: String,
}

impl Completion {
    fn success(result: Option<JobResult>, message: impl Into<String>) -> Self {
        Self {
            state: JobState::Completed { exit_code: 0 },
            result,
            severity: Severity::Success,
            message: message.into(),
        }
    }

    fn failure(reason: FailureReason, message: impl Into<String>) -> Self {
        Self {
            state: JobState::Failed(reason),
            result: None,
            severity: Severity::Error,
            message: message.into(),
        }
    }

    fn terminated() -> Self {
        Self {
            state: JobState::Terminated,
            result: None,
            severity: Severity::Error,
            message: TERMINATED_MESSAGE.to_string(),
        }
    }

    /// Completion for a process that did not exit on its own.
    ///
    /// `Exited` is handled by each job kind, so it never reaches here.
    fn interrupted(status: ProcessStatus) -> Self {
        match status {
            ProcessStatus::SpawnFailed(msg) => {
                Self::failure(FailureReason::SpawnFailure(msg.clone()), msg)
            }
            ProcessStatus::Terminated | ProcessStatus::Exited(_) => Self::terminated(),
        }
    }
}

pub(crate) struct Job {
    id: JobId,
    kind: JobKind,
    state: JobState,
    emitter: JobEmitter,
    cancel: CancellationToken,
    config: Arc<OrchestratorConfig>,
}

impl Job {
    pub(crate) fn new(
        id: JobId,
        kind: JobKind,
        emitter: JobEmitter,
        cancel: CancellationToken,
        config: Arc<OrchestratorConfig>,
    ) -> Self {
        Self {
            id,
            kind,
            state: JobState::Running,
            emitter,
            cancel,
            config,
        }
    }

    /// Drive the job to its terminal state.
    pub(crate) async fn run(mut self, plan: JobPlan, registry: &JobRegistry) -> JobOutcome {
        let completion = match plan {
            JobPlan::Search { query } => self.search(&query).await,
            JobPlan::Download { source, format } => self.download(&source, format).await,
            JobPlan::Command { invocation } => self.command(&invocation).await,
        };

        let Completion {
            state,
            result,
            severity,
            message,
        } = completion;
        self.state.advance(state);

        match &self.state {
            JobState::Completed { exit_code } => {
                tracing::info!(job_id = %self.id, kind = %self.kind, exit_code, "Job completed");
            }
            JobState::Failed(reason) => {
                tracing::warn!(job_id = %self.id, kind = %self.kind, %reason, "Job failed");
            }
            JobState::Terminated => {
                tracing::info!(job_id = %self.id, kind = %self.kind, "Job terminated");
            }
            JobState::Running => {}
        }

        let download = match &result {
            Some(JobResult::Download { title, filename }) => Some(DownloadLink {
                title: title.clone(),
                filename: filename.clone(),
                download_url: download_url(filename),
            }),
            _ => None,
        };
        self.emitter.finish(severity, message, download);

        if let Err(e) = registry.unregister(&self.id).await {
            // Shutdown already swept the registry.
            tracing::debug!(job_id = %self.id, error = %e, "Job already unregistered");
        }

        JobOutcome {
            job_id: self.id,
            kind: self.kind,
            state: self.state,
            result,
        }
    }

    async fn execute(&mut self, invocation: &Invocation, mode: StdoutMode) -> ProcessReport {
        let ctx = ProcessContext {
            rules: &self.config.classifier,
            cancel: &self.cancel,
            drain_timeout: self.config.drain_timeout,
            capture_limit: self.config.capture_limit,
        };
        run_process(invocation, mode, &ctx, &mut self.emitter).await
    }

    async fn search(&mut self, query: &str) -> Completion {
        let invocation = self
            .config
            .tool
            .invocation(search_args(query, self.config.search_limit));
        let report = self.execute(&invocation, StdoutMode::Capture).await;

        match report.status {
            ProcessStatus::Exited(0) if report.overflowed => Completion::failure(
                FailureReason::ParseFailure("search output exceeded capture limit".into()),
                "Failed to parse search results",
            ),
            ProcessStatus::Exited(0) => match parse_search_output(&report.captured) {
                Ok(results) => {
                    let message = format!("Search complete: {} results", results.len());
                    Completion::success(Some(JobResult::Search { results }), message)
                }
                Err(e) => Completion::failure(
                    FailureReason::ParseFailure(e.to_string()),
                    "Failed to parse search results",
                ),
            },
            ProcessStatus::Exited(code) => Completion::failure(
                FailureReason::NonZeroExit(code),
                format!("Search failed with exit code {code}"),
            ),
            status => Completion::interrupted(status),
        }
    }

    /// Metadata phase, then the download itself, then artifact discovery.
    async fn download(&mut self, source: &str, format: MediaFormat) -> Completion {
        self.emitter.emit(Severity::Info, "Fetching video information...");

        let invocation = self.config.tool.invocation(info_args(source));
        let report = self.execute(&invocation, StdoutMode::Capture).await;
        let info = match report.status {
            ProcessStatus::Exited(0) if report.overflowed => {
                return Completion::failure(
                    FailureReason::ParseFailure("video info exceeded capture limit".into()),
                    "Failed to parse video info",
                )
            }
            ProcessStatus::Exited(0) => match VideoInfo::parse(&report.captured) {
                Ok(info) => info,
                Err(e) => {
                    return Completion::failure(
                        FailureReason::ParseFailure(e.to_string()),
                        "Failed to parse video info",
                    )
                }
            },
            ProcessStatus::Exited(code) => {
                return Completion::failure(FailureReason::NonZeroExit(code), "Video not found")
            }
            status => return Completion::interrupted(status),
        };

        let title = info.title_or_default().to_string();
        let stem = sanitize_title(&title);
        let extension = format.extension();
        let output = self.config.download_dir.join(format!("{stem}.{extension}"));

        self.emitter.emit(Severity::Info, format!("Title: {title}"));
        self.emitter.emit(
            Severity::Info,
            format!("Format: {}", extension.to_uppercase()),
        );
        self.emitter.emit(Severity::Info, "Starting download...");

        let invocation = self
            .config
            .tool
            .invocation(download_args(source, &output, format));
        let report = self.execute(&invocation, StdoutMode::Classify).await;

        match report.status {
            ProcessStatus::Exited(0) => {
                let filename = resolve_artifact(&self.config.download_dir, &stem, extension).await;
                tracing::info!(
                    job_id = %self.id,
                    download_url = %download_url(&filename),
                    "Artifact ready"
                );
                let message = format!("Download complete! File: {filename}");
                Completion::success(Some(JobResult::Download { title, filename }), message)
            }
            ProcessStatus::Exited(code) => Completion::failure(
                FailureReason::NonZeroExit(code),
                format!("Download failed with exit code {code}"),
            ),
            status => Completion::interrupted(status),
        }
    }

    async fn command(&mut self, invocation: &Invocation) -> Completion {
        self.emitter.emit(Severity::Info, format!("Running: {invocation}"));
        let report = self.execute(invocation, StdoutMode::Classify).await;

        match report.status {
            ProcessStatus::Exited(0) => Completion::success(None, "Command completed successfully"),
            ProcessStatus::Exited(code) => Completion::failure(
                FailureReason::NonZeroExit(code),
                format!("Command failed with exit code {code}"),
            ),
            status => Completion::interrupted(status),
        }
    }
}
