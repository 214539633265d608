//! Job state machine and outcome types.

use std::fmt;

use mediarelay_core::search::SearchResult;
use mediarelay_core::types::{JobId, JobKind};

/// Public path under which finished downloads are served.
pub const DOWNLOADS_ROUTE: &str = "/downloads";

/// Server-relative URL of a file in the download directory.
pub fn download_url(filename: &str) -> String {
    format!("{DOWNLOADS_ROUTE}/{filename}")
}

/// Why a job failed after it was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The executable was missing or unusable. Carries the diagnostic.
    SpawnFailure(String),
    /// The subprocess ran and returned a failure code.
    NonZeroExit(i32),
    /// The tool's structured output could not be decoded.
    ParseFailure(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpawnFailure(msg) => write!(f, "spawn failure: {msg}"),
            Self::NonZeroExit(code) => write!(f, "exited with code {code}"),
            Self::ParseFailure(msg) => write!(f, "parse failure: {msg}"),
        }
    }
}

/// Lifecycle of a job: `Running` moves to exactly one terminal state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Running,
    Completed { exit_code: i32 },
    Failed(FailureReason),
    Terminated,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Move to `next`. Terminal states are absorbing; a transition out of
    /// one is ignored and reported as `false`.
    pub fn advance(&mut self, next: JobState) -> bool {
        if self.is_terminal() {
            return false;
        }
        *self = next;
        true
    }
}

/// Structured product of a successful job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobResult {
    Search { results: Vec<SearchResult> },
    Download { title: String, filename: String },
}

/// Final report of a job, delivered once after its terminal event.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_id: JobId,
    pub kind: JobKind,
    pub state: JobState,
    pub result: Option<JobResult>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.state, JobState::Completed { exit_code: 0 })
    }

    pub fn search_results(&self) -> Option<&[SearchResult]> {
        match &self.result {
            Some(JobResult::Search { results }) => Some(results),
            _ => None,
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match &self.result {
            Some(JobResult::Download { filename, .. }) => Some(filename),
            _ => None,
        }
    }

    /// Where the finished download can be fetched over HTTP.
    pub fn download_url(&self) -> Option<String> {
        self.filename().map(download_url)
    }
}
