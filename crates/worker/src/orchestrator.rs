//! Job orchestrator.
//!
//! [`Orchestrator`] is the entry point the request layer talks to. It
//! validates a request, allocates a job id, registers the job, and hands
//! the work to a tracked background task. Everything after
//! [`Orchestrator::start`] returns is reported through the event bus and
//! the job's one-shot outcome channel.
//!
//! Every job's termination token is a child of a master token, so
//! [`Orchestrator::shutdown`] can refuse new work and stop all running
//! jobs in one sweep.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use mediarelay_core::classifier::ClassifierRules;
use mediarelay_core::error::CoreError;
use mediarelay_core::tool::ToolCommand;
use mediarelay_core::types::{JobId, JobKind};
use mediarelay_events::EventBus;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::emitter::JobEmitter;
use crate::job::JobOutcome;
use crate::plan::{JobParameters, JobPlan};
use crate::process::DEFAULT_CAPTURE_LIMIT;
use crate::registry::{JobRegistry, JobSummary, RegistryError};
use crate::runner::Job;

/// Default number of search hits requested from the tool.
pub const DEFAULT_SEARCH_LIMIT: u32 = 10;

/// Default time to keep reading buffered output after a process exits.
const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Static configuration shared by every job.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How to launch the retrieval tool.
    pub tool: ToolCommand,
    /// The only directory subprocesses write to.
    pub download_dir: PathBuf,
    pub search_limit: u32,
    pub classifier: ClassifierRules,
    pub drain_timeout: Duration,
    /// Upper bound on captured tool output; exceeding it fails the job.
    pub capture_limit: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tool: ToolCommand::default(),
            download_dir: PathBuf::from("./downloads"),
            search_limit: DEFAULT_SEARCH_LIMIT,
            classifier: ClassifierRules::default(),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            capture_limit: DEFAULT_CAPTURE_LIMIT,
        }
    }
}

/// Errors returned synchronously by [`Orchestrator`] operations.
///
/// Failures of a job that has already started are never reported here;
/// they arrive as terminal events.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Shutting down, not accepting new jobs")]
    ShuttingDown,
}

/// Handle returned by [`Orchestrator::start`].
///
/// Dropping `outcome` is fine for callers that only need the id.
#[derive(Debug)]
pub struct StartedJob {
    pub job_id: JobId,
    pub outcome: oneshot::Receiver<JobOutcome>,
}

impl StartedJob {
    /// Wait for the job to finish. `None` if the job task was lost.
    pub async fn wait(self) -> Option<JobOutcome> {
        self.outcome.await.ok()
    }
}

pub struct Orchestrator {
    config: Arc<OrchestratorConfig>,
    registry: Arc<JobRegistry>,
    bus: Arc<EventBus>,
    tracker: TaskTracker,
    /// Master cancellation token -- cancelled during shutdown.
    cancel: CancellationToken,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, bus: Arc<EventBus>) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(JobRegistry::new()),
            bus,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub fn is_shutting_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Validate `params`, register a new job and start it in the background.
    ///
    /// Returns as soon as the job is registered. Validation errors are
    /// returned before anything is spawned.
    pub async fn start(
        &self,
        kind: JobKind,
        params: JobParameters,
    ) -> Result<StartedJob, OrchestratorError> {
        if self.is_shutting_down() {
            return Err(OrchestratorError::ShuttingDown);
        }

        let plan = JobPlan::prepare(kind, params, &self.config.tool)?;

        let job_id = JobId::generate();
        let cancel = self.cancel.child_token();

        if let Err(e) = self
            .registry
            .register(job_id.clone(), kind, cancel.clone())
            .await
        {
            tracing::error!(job_id = %job_id, error = %e, "Job registration failed");
            return Err(e.into());
        }

        let job = Job::new(
            job_id.clone(),
            kind,
            JobEmitter::new(job_id.clone(), Arc::clone(&self.bus)),
            cancel,
            Arc::clone(&self.config),
        );
        let registry = Arc::clone(&self.registry);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let (go_tx, go_rx) = oneshot::channel::<()>();

        // The task is tracked before the shutdown check below, so a
        // shutdown that starts after the check always waits for it. If the
        // check fails the task exits without publishing anything.
        self.tracker.spawn(async move {
            if go_rx.await.is_err() {
                return;
            }
            let outcome = job.run(plan, &registry).await;
            let _ = outcome_tx.send(outcome);
        });

        if self.is_shutting_down() {
            drop(go_tx);
            let _ = self.registry.unregister(&job_id).await;
            return Err(OrchestratorError::ShuttingDown);
        }
        let _ = go_tx.send(());

        tracing::info!(job_id = %job_id, kind = %kind, "Job started");

        Ok(StartedJob {
            job_id,
            outcome: outcome_rx,
        })
    }

    /// Signal a single running job to terminate.
    ///
    /// The job finishes with a terminal "Job terminated" event. Cancelling
    /// a job twice is a no-op.
    pub async fn cancel(&self, job_id: &JobId) -> Result<(), OrchestratorError> {
        self.registry.terminate(job_id).await?;
        tracing::info!(job_id = %job_id, "Job cancellation requested");
        Ok(())
    }

    /// Snapshot of currently running jobs.
    pub async fn running_jobs(&self) -> Vec<JobSummary> {
        self.registry.snapshot().await
    }

    /// Stop accepting jobs, terminate every running job and wait for all
    /// of them to publish their terminal events.
    ///
    /// Returns `false` if jobs were still settling when `timeout` expired.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        tracing::info!("Shutting down orchestrator");
        self.cancel.cancel();

        let signalled = self.registry.terminate_all().await;
        self.tracker.close();

        let settled = tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok();

        if settled {
            tracing::info!(signalled, "Orchestrator shut down complete");
        } else {
            tracing::warn!(
                signalled,
                remaining = self.tracker.len(),
                "Jobs still running after shutdown timeout"
            );
        }
        settled
    }
}
